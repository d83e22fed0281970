//! `UNION` set-operation trees.
//!
//! A union tree is a `RETURN` with structure: leaves become sub-queries in
//! the top-level range table, internal nodes become a set-operation tree.
//! Column counts must agree between the two legs of every node, and each
//! output column resolves to a common type; unknown-typed constants and
//! parameters on a leaf are coerced in place.

use crate::ast::{Clause, ReturnClause, SetOp};
use crate::rel::{
    ColumnRef, Expr, Query, RangeTableEntry, RteColumn, RteKind, SetOpArg, SetOpColumn,
    SetOpKind, SetOperation, TargetEntry, ValueType,
};
use crate::transform::context::{ClauseChain, NsItem, Transformer};
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::transform_limit;
use crate::transform::projection::transform_order_by;

/// Transforms a `UNION` tree rooted at `rc`.
pub fn transform_union(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    rc: &ReturnClause,
) -> TransformResult<Query> {
    // a union is a parent node; the query parts around it live in its legs
    if chain.prev().is_some() {
        return Err(ErrorKind::InternalInvariantViolated(
            "set operation cannot follow a previous clause",
        )
        .into());
    }
    // graph queries have no recursive CTE analog
    if tx.in_recursive_cte() {
        return Err(TransformError::at(ErrorKind::RecursiveCteUnsupported, rc.location));
    }

    let mut query = Query::new();

    // the outermost ORDER BY / SKIP / LIMIT belong to the whole union;
    // strip them before recursing
    let mut top = rc.clone();
    let order_by = std::mem::take(&mut top.order_by);
    let skip = top.skip.take();
    let limit = top.limit.take();

    let (setop, columns) = transform_union_tree(tx, &top)?;
    let op = match setop {
        SetOpArg::Op(op) => *op,
        SetOpArg::Rte(_) => {
            return Err(ErrorKind::InternalInvariantViolated(
                "set-operation root resolved to a leaf",
            )
            .into())
        }
    };

    // the dummy target list points at the leftmost leaf with the common
    // column types; ORDER BY resolves against these outputs only
    let leftmost = leftmost_rte(&op);
    {
        let scope = tx.scope_mut();
        for (i, col) in columns.iter().enumerate() {
            scope.range_table[leftmost].columns[i].ty = col.ty;
        }
        scope.namespace.push(NsItem {
            rte: leftmost,
            rel_visible: false,
            cols_visible: true,
            lateral_only: false,
        });
    }
    for (i, col) in columns.iter().enumerate() {
        let resno = query.next_resno();
        query.target_list.push(TargetEntry {
            expr: Expr::Column(ColumnRef {
                level: 0,
                rte: leftmost,
                attno: i + 1,
                name: col.name.clone(),
                ty: col.ty,
            }),
            name: col.name.clone(),
            resno,
            junk: false,
        });
    }

    query.sort_clause = transform_order_by(tx, &order_by, &mut query, false)?;
    query.skip = transform_limit(tx, skip.as_ref(), "SKIP")?;
    query.limit = transform_limit(tx, limit.as_ref(), "LIMIT")?;
    query.set_operations = Some(op);

    tx.finalize_query(&mut query, None);
    // the leaves stay out of the join tree; only the set-operation tree
    // consumes them
    query.jointree.items.clear();
    Ok(query)
}

fn leftmost_rte(op: &SetOperation) -> usize {
    match &op.larg {
        SetOpArg::Rte(idx) => *idx,
        SetOpArg::Op(inner) => leftmost_rte(inner),
    }
}

/// Recursively transforms a set-operation tree node.
fn transform_union_tree(
    tx: &mut Transformer<'_>,
    node: &ReturnClause,
) -> TransformResult<(SetOpArg, Vec<RteColumn>)> {
    // an internal node that carries its own ordering or limits is
    // transformed whole, as a leaf
    let is_leaf = node.op == SetOp::None
        || !node.order_by.is_empty()
        || node.skip.is_some()
        || node.limit.is_some();

    if is_leaf {
        let leaf = Clause::Return(node.clone());
        let alias = format!("*SELECT* {}", tx.scope().range_table.len() + 1);
        let rte = tx.transform_clause_as_subquery(ClauseChain::single(&leaf), &alias, false)?;
        let columns = tx.scope().range_table[rte].columns.clone();
        return Ok((SetOpArg::Rte(rte), columns));
    }

    let (larg, lcols) = match &node.larg {
        Some(left) => transform_union_tree(tx, left)?,
        None => {
            return Err(ErrorKind::InternalInvariantViolated(
                "set operation without a left leg",
            )
            .into())
        }
    };
    let (rarg, rcols) = match &node.rarg {
        Some(right) => transform_union_tree(tx, right)?,
        None => {
            return Err(ErrorKind::InternalInvariantViolated(
                "set operation without a right leg",
            )
            .into())
        }
    };

    if lcols.len() != rcols.len() {
        let right_location = node.rarg.as_ref().and_then(|r| r.location);
        return Err(TransformError::at(
            ErrorKind::UnionColumnMismatch {
                left: lcols.len(),
                right: rcols.len(),
            },
            right_location,
        ));
    }

    let mut columns = Vec::with_capacity(lcols.len());
    let mut op_columns = Vec::with_capacity(lcols.len());
    for (i, (lcol, rcol)) in lcols.iter().zip(&rcols).enumerate() {
        let common = lcol
            .ty
            .common_with(rcol.ty)
            .ok_or(ErrorKind::InvalidTypeCast { column: i + 1 })?;

        coerce_unknown_leaf_output(tx, &larg, i, common);
        coerce_unknown_leaf_output(tx, &rarg, i, common);

        columns.push(RteColumn {
            name: lcol.name.clone(),
            ty: common,
        });
        op_columns.push(SetOpColumn {
            ty: common,
            dedup: !node.all,
            // hash-based dedup is disabled for UNION so duplicate
            // elimination stays exact
            hashable: false,
        });
    }

    Ok((
        SetOpArg::Op(Box::new(SetOperation {
            op: SetOpKind::Union,
            all: node.all,
            larg,
            rarg,
            columns: op_columns,
        })),
        columns,
    ))
}

/// Replaces an unknown-typed constant or parameter output of a leaf with
/// its coerced form. Unknown-typed non-const expressions are left alone;
/// the host planner may still fold them.
fn coerce_unknown_leaf_output(
    tx: &mut Transformer<'_>,
    arg: &SetOpArg,
    column: usize,
    common: ValueType,
) {
    let SetOpArg::Rte(idx) = arg else {
        return;
    };
    let scope = tx.scope_mut();
    let Some(RangeTableEntry {
        kind: RteKind::Subquery { query, .. },
        columns,
        ..
    }) = scope.range_table.get_mut(*idx)
    else {
        return;
    };
    let Some(te) = query
        .target_list
        .iter_mut()
        .filter(|te| !te.junk)
        .nth(column)
    else {
        return;
    };
    if te.expr.value_type() == ValueType::Unknown
        && matches!(te.expr, Expr::Parameter(_) | Expr::Literal(_))
    {
        let inner = std::mem::replace(&mut te.expr, Expr::Null { ty: common });
        te.expr = Expr::Coerce {
            ty: common,
            input: Box::new(inner),
        };
        if let Some(col) = columns.get_mut(column) {
            col.ty = common;
        }
    }
}
