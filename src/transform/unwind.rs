//! `UNWIND expr AS name`.

use crate::bdm::BdmValue;
use crate::ast::UnwindClause;
use crate::rel::{BuiltinFunc, Expr, Query, TargetEntry, ValueType};
use crate::transform::context::{ClauseChain, Transformer};
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::{transform_expr, ExprKind};

/// Transforms `UNWIND` into a set-returning expansion of the target
/// expression, projected under the clause's alias.
pub fn transform_unwind(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    uc: &UnwindClause,
) -> TransformResult<Query> {
    let mut query = Query::new();

    if let Some(prev) = chain.prev() {
        tx.handle_prev_clause(&mut query, prev)?;
    }

    if query.find_target(&uc.name).is_some() {
        return Err(TransformError::at(
            ErrorKind::DuplicateAlias {
                name: uc.name.clone(),
            },
            uc.location,
        ));
    }

    let expr = transform_expr(tx, &uc.value, ExprKind::SelectTarget)?;
    let unnest = Expr::Func {
        func: BuiltinFunc::Unnest,
        args: vec![expr, Expr::Literal(BdmValue::Bool(true))],
        ty: ValueType::Document,
    };

    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: unnest,
        name: uc.name.clone(),
        resno,
        junk: false,
    });
    tx.scope_mut().has_target_srfs = true;

    tx.finalize_query(&mut query, None);
    Ok(query)
}
