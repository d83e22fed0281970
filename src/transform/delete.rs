//! `DELETE` / `DETACH DELETE`.

use crate::ast::{self, DeleteClause};
use crate::rel::{BuiltinFunc, Query};
use crate::transform::context::{push_null_sentinel, ClauseChain, Transformer};
use crate::transform::create::push_clause_marker;
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::metadata::{self, clause_flags, DeleteClauseInfo, DeleteItem};

/// Output column carrying the `delete_clause` marker.
pub const DELETE_CLAUSE_COLUMN: &str = "_delete_clause";

/// Transforms a `DELETE` clause.
pub fn transform_delete(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    dc: &DeleteClause,
) -> TransformResult<Query> {
    let mut query = Query::new();
    push_null_sentinel(&mut query);

    let Some(prev) = chain.prev() else {
        return Err(TransformError::at(
            ErrorKind::FirstClauseIllegal { clause: "DELETE" },
            dc.location,
        ));
    };
    tx.handle_prev_clause(&mut query, prev)?;

    let mut items = Vec::with_capacity(dc.exprs.len());
    for expr in &dc.exprs {
        // only single-segment variable references may be deleted
        let ast::Expr::Variable(name) = expr else {
            return Err(TransformError::at(
                ErrorKind::InternalInvariantViolated("DELETE expects variable references"),
                dc.location,
            ));
        };
        let entity_position = tx
            .mark_target_volatile(&mut query, name)
            .ok_or_else(|| {
                TransformError::at(
                    ErrorKind::UndefinedVariable { name: name.clone() },
                    dc.location,
                )
            })?;
        items.push(DeleteItem {
            var_name: name.clone(),
            entity_position: entity_position as u32,
        });
    }

    let mut flags = clause_flags::NONE;
    if !chain.has_next() {
        flags |= clause_flags::TERMINAL;
    }

    let info = DeleteClauseInfo {
        graph_name: tx.graph.name.clone(),
        graph_oid: tx.graph.oid,
        detach: dc.detach,
        items,
        flags,
    };
    push_clause_marker(
        &mut query,
        BuiltinFunc::DeleteClauseMarker,
        DELETE_CLAUSE_COLUMN,
        metadata::encode(&info)?,
    );

    tx.finalize_query(&mut query, None);
    Ok(query)
}
