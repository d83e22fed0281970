//! `SET` / `REMOVE`.

use crate::ast::SetClause;
use crate::rel::{BuiltinFunc, Query, TargetEntry};
use crate::transform::context::{push_null_sentinel, wrap_volatile, ClauseChain, Transformer};
use crate::transform::create::push_clause_marker;
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::{transform_expr, ExprKind};
use crate::transform::metadata::{self, clause_flags, SetClauseInfo, UpdateItem};

/// Output column carrying the `set_clause` marker.
pub const SET_CLAUSE_COLUMN: &str = "_set_clause";

/// Transforms a `SET`/`REMOVE` clause.
pub fn transform_set(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    sc: &SetClause,
) -> TransformResult<Query> {
    let clause_name: &'static str = if sc.is_remove { "REMOVE" } else { "SET" };

    let mut query = Query::new();
    push_null_sentinel(&mut query);

    let Some(prev) = chain.prev() else {
        return Err(TransformError::at(
            ErrorKind::FirstClauseIllegal {
                clause: clause_name,
            },
            sc.location,
        ));
    };
    tx.handle_prev_clause(&mut query, prev)?;

    let mut items = Vec::with_capacity(sc.items.len());
    for item in &sc.items {
        if item.is_add {
            return Err(TransformError::at(
                ErrorKind::AddPropertiesFromMapUnsupported {
                    clause: clause_name,
                },
                item.location,
            ));
        }
        if item.path.len() != 1 {
            return Err(TransformError::at(
                ErrorKind::NestedPropertyUpdateUnsupported {
                    clause: clause_name,
                },
                item.location,
            ));
        }

        let entity_position = tx
            .mark_target_volatile(&mut query, &item.variable)
            .ok_or_else(|| {
                TransformError::at(
                    ErrorKind::UndefinedVariable {
                        name: item.variable.clone(),
                    },
                    item.location,
                )
            })?;

        let mut prop_position = 0u32;
        if !sc.is_remove {
            let value = item.value.as_ref().ok_or(
                ErrorKind::InternalInvariantViolated("SET item without a value expression"),
            )?;
            // the new value rides along as its own column, wrapped so the
            // planner cannot prune it
            let expr = wrap_volatile(transform_expr(tx, value, ExprKind::SelectTarget)?);
            let alias = tx.next_default_alias();
            let resno = query.next_resno();
            query.target_list.push(TargetEntry {
                expr,
                name: alias,
                resno,
                junk: false,
            });
            prop_position = resno as u32;
        }

        items.push(UpdateItem {
            var_name: item.variable.clone(),
            prop_name: item.path[0].clone(),
            entity_position: entity_position as u32,
            prop_position,
            remove: sc.is_remove,
        });
    }

    let mut flags = clause_flags::NONE;
    if !chain.has_next() {
        flags |= clause_flags::TERMINAL;
    }

    let info = SetClauseInfo {
        clause_name: clause_name.to_owned(),
        graph_name: tx.graph.name.clone(),
        items,
        flags,
    };
    push_clause_marker(
        &mut query,
        BuiltinFunc::SetClauseMarker,
        SET_CLAUSE_COLUMN,
        metadata::encode(&info)?,
    );

    tx.finalize_query(&mut query, None);
    Ok(query)
}
