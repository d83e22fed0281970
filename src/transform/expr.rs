//! Expression transformation.
//!
//! Lowers parsed expressions into relational expressions, resolving
//! variables against the visible column namespace first and the current
//! clause's entity registry second. Literal containers fold into document
//! literals so property constraints arrive at the executor as single
//! values.

use crate::ast::{self, AstOp};
use crate::bdm::BdmValue;
use crate::rel::{BoolOp, CmpOp, Expr, ValueType};
use crate::transform::context::Transformer;
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::match_clause;

/// Which syntactic position an expression is transformed for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExprKind {
    /// A projection item.
    SelectTarget,
    /// A filter.
    Where,
    /// `SKIP`/`LIMIT`.
    Limit,
    /// A function in `FROM`.
    FromFunction,
    /// A property source of a mutating clause.
    InsertTarget,
}

const AGGREGATES: &[&str] = &["count", "sum", "avg", "min", "max", "collect"];

/// Transforms one expression.
pub fn transform_expr(
    tx: &mut Transformer<'_>,
    expr: &ast::Expr,
    kind: ExprKind,
) -> TransformResult<Expr> {
    match expr {
        ast::Expr::Literal(v) => Ok(Expr::Literal(v.clone())),
        ast::Expr::Parameter(name) => Ok(Expr::Parameter(name.clone())),
        ast::Expr::Variable(name) => resolve_variable(tx, name),
        ast::Expr::Property { base, path } => {
            let mut out = transform_expr(tx, base, kind)?;
            for segment in path {
                out = Expr::Call {
                    name: "property_get".to_owned(),
                    args: vec![out, Expr::Literal(BdmValue::String(segment.clone()))],
                };
            }
            Ok(out)
        }
        ast::Expr::Map(pairs) => {
            let mut values = Vec::with_capacity(pairs.len());
            for (_, value) in pairs {
                values.push(transform_expr(tx, value, kind)?);
            }
            if values.iter().all(|v| matches!(v, Expr::Literal(_))) {
                let folded = pairs
                    .iter()
                    .zip(values)
                    .map(|((key, _), value)| match value {
                        Expr::Literal(v) => (key.clone(), v),
                        _ => (key.clone(), BdmValue::Null),
                    })
                    .collect();
                Ok(Expr::Literal(BdmValue::Object(folded)))
            } else {
                let mut args = Vec::with_capacity(pairs.len() * 2);
                for ((key, _), value) in pairs.iter().zip(values) {
                    args.push(Expr::Literal(BdmValue::String(key.clone())));
                    args.push(value);
                }
                Ok(Expr::Call {
                    name: "build_map".to_owned(),
                    args,
                })
            }
        }
        ast::Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(transform_expr(tx, item, kind)?);
            }
            if values.iter().all(|v| matches!(v, Expr::Literal(_))) {
                let folded = values
                    .into_iter()
                    .map(|v| match v {
                        Expr::Literal(v) => v,
                        _ => BdmValue::Null,
                    })
                    .collect();
                Ok(Expr::Literal(BdmValue::Array(folded)))
            } else {
                Ok(Expr::Call {
                    name: "build_list".to_owned(),
                    args: values,
                })
            }
        }
        ast::Expr::Op { op, args } => transform_op(tx, *op, args, kind),
        ast::Expr::FuncCall { name, args } => {
            let mut transformed = Vec::with_capacity(args.len());
            for arg in args {
                transformed.push(transform_expr(tx, arg, kind)?);
            }
            if AGGREGATES.contains(&name.to_ascii_lowercase().as_str()) {
                tx.scope_mut().has_aggs = true;
                Ok(Expr::Aggregate {
                    name: name.to_ascii_lowercase(),
                    args: transformed,
                    distinct: false,
                })
            } else {
                Ok(Expr::Call {
                    name: name.clone(),
                    args: transformed,
                })
            }
        }
        ast::Expr::SubPattern(paths) => {
            let query =
                match_clause::transform_sub_pattern_paths(tx, paths, kind == ExprKind::Where)?;
            tx.scope_mut().has_sublinks = true;
            Ok(Expr::SubLink(Box::new(query)))
        }
    }
}

/// Resolves a bare variable: the visible column namespace first (names
/// flowing out of earlier clauses), then the current clause's transform
/// entities (pattern variables being built right now).
pub(crate) fn resolve_variable(tx: &Transformer<'_>, name: &str) -> TransformResult<Expr> {
    if let Some(column) = tx.lookup_column(name) {
        return Ok(column);
    }
    if let Some(entity) = tx.find_entity_current(name) {
        if let Some(expr) = &entity.expr {
            return Ok(expr.clone());
        }
    }
    Err(TransformError::new(ErrorKind::UndefinedVariable {
        name: name.to_owned(),
    }))
}

fn transform_op(
    tx: &mut Transformer<'_>,
    op: AstOp,
    args: &[ast::Expr],
    kind: ExprKind,
) -> TransformResult<Expr> {
    let mut transformed = Vec::with_capacity(args.len());
    for arg in args {
        transformed.push(transform_expr(tx, arg, kind)?);
    }

    let bool_op = match op {
        AstOp::And => Some(BoolOp::And),
        AstOp::Or => Some(BoolOp::Or),
        AstOp::Not => Some(BoolOp::Not),
        _ => None,
    };
    if let Some(op) = bool_op {
        return Ok(Expr::Bool {
            op,
            args: transformed,
        });
    }

    let cmp = match op {
        AstOp::Eq => CmpOp::Eq,
        AstOp::Ne => CmpOp::Ne,
        AstOp::Lt => CmpOp::Lt,
        AstOp::Le => CmpOp::Le,
        AstOp::Gt => CmpOp::Gt,
        AstOp::Ge => CmpOp::Ge,
        AstOp::Add => CmpOp::Add,
        AstOp::Sub => CmpOp::Sub,
        AstOp::Mul => CmpOp::Mul,
        AstOp::Div => CmpOp::Div,
        AstOp::And | AstOp::Or | AstOp::Not => {
            return Err(ErrorKind::InternalInvariantViolated(
                "boolean operator fell through",
            )
            .into())
        }
    };
    let mut it = transformed.into_iter();
    match (it.next(), it.next()) {
        (Some(left), Some(right)) => Ok(Expr::Comparison {
            op: cmp,
            left: Box::new(left),
            right: Box::new(right),
        }),
        _ => Err(ErrorKind::InternalInvariantViolated("binary operator arity").into()),
    }
}

/// Transforms a `SKIP`/`LIMIT` expression: coerced to a 64-bit integer and
/// forbidden from referencing current-level columns.
pub fn transform_limit(
    tx: &mut Transformer<'_>,
    expr: Option<&ast::Expr>,
    construct: &'static str,
) -> TransformResult<Option<Expr>> {
    let Some(expr) = expr else {
        return Ok(None);
    };
    let transformed = transform_expr(tx, expr, ExprKind::Limit)?;
    if transformed.references_columns() {
        return Err(TransformError::new(ErrorKind::InvalidSkipLimit { construct }));
    }
    Ok(Some(Expr::Coerce {
        ty: ValueType::Int,
        input: Box::new(transformed),
    }))
}

/// ANDs a list of quals into a single boolean expression.
pub fn and_quals(mut quals: Vec<Expr>) -> Option<Expr> {
    match quals.len() {
        0 => None,
        1 => quals.pop(),
        _ => Some(Expr::Bool {
            op: BoolOp::And,
            args: quals,
        }),
    }
}

/// Coerces a qual to boolean.
pub fn coerce_to_bool(expr: Expr) -> Expr {
    match expr.value_type() {
        ValueType::Bool => expr,
        _ => Expr::Coerce {
            ty: ValueType::Bool,
            input: Box::new(expr),
        },
    }
}
