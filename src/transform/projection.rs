//! `RETURN` / `WITH` projection.
//!
//! `WITH` is a `RETURN` whose wrapper admits an optional `WHERE`: the
//! projection is transformed as-is, and when a filter is present the
//! projection becomes a sub-query with the filter applied at the outer
//! level.

use crate::ast::{self, Clause, ReturnClause, SetOp, SortItem, WithClause};
use crate::rel::{Expr, Query, SortClauseItem, TargetEntry};
use crate::transform::context::{ClauseChain, Transformer, PREV_CLAUSE_ALIAS};
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::{coerce_to_bool, transform_expr, transform_limit, ExprKind};

/// Transforms a plain `RETURN`.
pub fn transform_return(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    rc: &ReturnClause,
) -> TransformResult<Query> {
    let mut query = Query::new();

    if let Some(prev) = chain.prev() {
        tx.transform_clause_as_subquery(prev, PREV_CLAUSE_ALIAS, true)?;
    }

    for item in &rc.items {
        let expr = transform_expr(tx, &item.expr, ExprKind::SelectTarget)?;
        let name = match &item.alias {
            Some(alias) => alias.clone(),
            None => derive_column_name(&item.expr).unwrap_or_else(|| tx.next_default_alias()),
        };
        let resno = query.next_resno();
        query.target_list.push(TargetEntry {
            expr,
            name,
            resno,
            junk: false,
        });
    }

    query.sort_clause = transform_order_by(tx, &rc.order_by, &mut query, true)?;

    // automatic GROUP BY: once any aggregate appears, every non-aggregate
    // projection becomes a group key
    let has_aggs = query
        .target_list
        .iter()
        .any(|te| te.expr.contains_aggregate());
    if has_aggs {
        for te in query.target_list.iter().filter(|te| !te.junk) {
            if !te.expr.contains_aggregate() && !query.group_clause.contains(&te.resno) {
                query.group_clause.push(te.resno);
            }
        }
        query.has_aggs = true;
    }

    query.distinct = rc.distinct;
    query.skip = transform_limit(tx, rc.skip.as_ref(), "SKIP")?;
    query.limit = transform_limit(tx, rc.limit.as_ref(), "LIMIT")?;

    tx.finalize_query(&mut query, None);
    Ok(query)
}

/// Transforms `WITH`, wrapping the projection when a `WHERE` is present.
pub fn transform_with(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    wc: &WithClause,
) -> TransformResult<Query> {
    let rc = ReturnClause {
        distinct: wc.distinct,
        items: wc.items.clone(),
        order_by: wc.order_by.clone(),
        skip: wc.skip.clone(),
        limit: wc.limit.clone(),
        op: SetOp::None,
        all: false,
        larg: None,
        rarg: None,
        location: wc.location,
    };
    let wrapper = Clause::Return(rc);
    let wrapped = chain.with_replacement(&wrapper);

    let Some(filter) = &wc.where_clause else {
        let Clause::Return(rc) = &wrapper else {
            return Err(ErrorKind::InternalInvariantViolated("with wrapper shape").into());
        };
        return transform_return(tx, wrapped, rc);
    };

    let mut query = Query::new();
    let rte = tx.transform_clause_as_subquery(wrapped, PREV_CLAUSE_ALIAS, true)?;
    tx.expand_rte_into_target_list(&mut query, rte);

    let qual = coerce_to_bool(transform_expr(tx, filter, ExprKind::Where)?);
    tx.finalize_query(&mut query, Some(qual));
    Ok(query)
}

/// Resolves `ORDER BY` keys against the target list by structural
/// equality after stripping implicit coercions. When `allow_append` is
/// set, unmatched keys are added as resolution-only (junk) entries;
/// otherwise resolution failure is an error (`UNION` outer sorts).
pub fn transform_order_by(
    tx: &mut Transformer<'_>,
    items: &[SortItem],
    query: &mut Query,
    allow_append: bool,
) -> TransformResult<Vec<SortClauseItem>> {
    let mut sort_clause = Vec::with_capacity(items.len());

    for item in items {
        // a bare name naming an output column sorts by that column
        if let ast::Expr::Variable(name) = &item.expr {
            if let Some(te) = query.find_target(name) {
                sort_clause.push(SortClauseItem {
                    resno: te.resno,
                    descending: item.descending,
                });
                continue;
            }
        }
        let expr = transform_expr(tx, &item.expr, ExprKind::SelectTarget)?;
        let resno = find_or_append_target(query, expr, allow_append)
            .ok_or_else(|| TransformError::at(ErrorKind::InvalidUnionOrderBy, item.location))?;
        sort_clause.push(SortClauseItem {
            resno,
            descending: item.descending,
        });
    }

    Ok(sort_clause)
}

fn find_or_append_target(query: &mut Query, expr: Expr, allow_append: bool) -> Option<usize> {
    for te in &query.target_list {
        if te.expr.strip_coercions() == expr.strip_coercions() {
            return Some(te.resno);
        }
    }
    if !allow_append {
        return None;
    }
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr,
        name: format!("_sort_{resno}"),
        resno,
        junk: true,
    });
    Some(resno)
}

fn derive_column_name(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Variable(name) => Some(name.clone()),
        ast::Expr::Property { path, .. } => path.last().cloned(),
        ast::Expr::FuncCall { name, .. } => Some(name.clone()),
        _ => None,
    }
}
