//! `MATCH`, `OPTIONAL MATCH`, and embedded sub-patterns.

use crate::ast::{Clause, MatchClause, Path, SubPattern};
use crate::rel::{
    FromItem, JoinExpr, JoinKind, Query, RangeTableEntry, RteColumn, RteKind,
};
use crate::transform::context::{
    ClauseChain, NsItem, Transformer, OPT_RIGHT_ALIAS, PREV_CLAUSE_ALIAS,
};
use crate::transform::errors::{ErrorKind, TransformResult};
use crate::transform::pattern;

/// Transforms `MATCH` / `OPTIONAL MATCH`.
pub fn transform_match(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    mc: &MatchClause,
) -> TransformResult<Query> {
    // an OPTIONAL MATCH with nothing before it degenerates to a plain match
    if mc.optional && chain.prev().is_some() {
        transform_optional_match(tx, chain)
    } else {
        transform_match_pattern(tx, chain, mc)
    }
}

fn transform_match_pattern(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    mc: &MatchClause,
) -> TransformResult<Query> {
    let mut query = Query::new();

    if let Some(prev) = chain.prev() {
        // pass every variable introduced by earlier clauses through
        tx.handle_prev_clause(&mut query, prev)?;
    }

    pattern::transform_match_pattern(tx, &mut query, &mc.pattern, mc.where_clause.as_ref())?;
    Ok(query)
}

/// Builds the lateral-left-join between the previous clause and this
/// `OPTIONAL MATCH`: previous rows survive unmatched with nulls on the
/// right, and the right side may reference the left side's columns.
fn transform_optional_match(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
) -> TransformResult<Query> {
    let mut query = Query::new();
    let prev = chain
        .prev()
        .ok_or(ErrorKind::InternalInvariantViolated("optional match without previous clause"))?;

    let l_rte = tx.transform_clause_as_subquery(prev, PREV_CLAUSE_ALIAS, false)?;
    tx.scope_mut().namespace.push(NsItem {
        rte: l_rte,
        rel_visible: false,
        cols_visible: true,
        lateral_only: true,
    });

    // transform this clause in isolation (prev detached) with the left
    // side laterally visible
    tx.scope_mut().lateral_active = true;
    let isolated = ClauseChain::single(chain.current());
    let r_rte = tx.transform_clause_as_subquery(isolated, OPT_RIGHT_ALIAS, false)?;
    tx.scope_mut().lateral_active = false;
    tx.scope_mut().namespace.clear();

    let join_rte = merge_join_columns(tx, l_rte, r_rte);
    tx.scope_mut()
        .joinlist
        .push(FromItem::Join(Box::new(JoinExpr {
            kind: JoinKind::LateralLeft,
            larg: FromItem::RteRef(l_rte),
            rarg: FromItem::RteRef(r_rte),
            rte: join_rte,
        })));
    tx.scope_mut().namespace.push(NsItem {
        rte: join_rte,
        rel_visible: false,
        cols_visible: true,
        lateral_only: false,
    });

    tx.expand_rte_into_target_list(&mut query, join_rte);
    tx.finalize_query(&mut query, None);
    Ok(query)
}

/// Concatenates the left columns with the right columns whose names are
/// new; on a name collision the left side wins, because the pattern is
/// referencing a variable declared by a previous clause.
pub(crate) fn merge_join_columns(tx: &mut Transformer<'_>, l_rte: usize, r_rte: usize) -> usize {
    let scope = tx.scope_mut();
    let mut merged: Vec<RteColumn> = scope.range_table[l_rte].columns.clone();
    for col in &scope.range_table[r_rte].columns {
        if !merged.iter().any(|c| c.name == col.name) {
            merged.push(col.clone());
        }
    }
    scope.add_rte(RangeTableEntry {
        alias: String::new(),
        kind: RteKind::Join {
            kind: JoinKind::LateralLeft,
        },
        columns: merged,
    })
}

/// Transforms a standalone sub-pattern clause.
pub fn transform_sub_pattern(
    tx: &mut Transformer<'_>,
    sp: &SubPattern,
) -> TransformResult<Query> {
    transform_sub_pattern_paths(tx, &sp.pattern, false)
}

/// Transforms an embedded sub-pattern into a query suitable for a
/// sub-link. Inside a `WHERE`, the pattern may only reference existing
/// variables.
pub fn transform_sub_pattern_paths(
    tx: &mut Transformer<'_>,
    paths: &[Path],
    where_mode: bool,
) -> TransformResult<Query> {
    let as_match = Clause::Match(MatchClause {
        optional: false,
        pattern: paths.to_vec(),
        where_clause: None,
        location: None,
    });

    // the sub-pattern builds its query in a scope of its own; the
    // enclosing clause's range table stays untouched
    tx.scopes.push(crate::transform::context::Scope {
        where_mode,
        ..Default::default()
    });
    let result: TransformResult<Query> = (|| {
        let mut query = Query::new();
        let rte =
            tx.transform_clause_as_subquery(ClauseChain::single(&as_match), PREV_CLAUSE_ALIAS, true)?;
        tx.expand_rte_into_target_list(&mut query, rte);
        tx.finalize_query(&mut query, None);
        Ok(query)
    })();
    tx.scopes.pop();
    result
}
