//! `MERGE`.
//!
//! Two shapes come out of here. Without a previous clause, the merge path
//! is converted to a `MATCH` and transformed as the producing sub-query,
//! so existing paths flow out and the executor creates the path when the
//! incoming side is empty. With a previous clause, the previous clause and
//! the merge-as-match sub-query meet in a lateral-left-join: previous rows
//! survive even when the path does not match, and the create branch fires
//! per such row.

use crate::ast::{Clause, MatchClause, MergeClause, NodePattern, Path, PathElementAst, RelPattern};
use crate::catalog::LabelKind;
use crate::rel::{BuiltinFunc, FromItem, JoinExpr, JoinKind, Query};
use crate::transform::context::{
    push_null_sentinel, ClauseChain, NsItem, Transformer, OPT_RIGHT_ALIAS, PREV_CLAUSE_ALIAS,
};
use crate::transform::create::push_clause_marker;
use crate::transform::entity::EntityKind;
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::{transform_expr, ExprKind};
use crate::transform::match_clause::merge_join_columns;
use crate::transform::metadata::{
    self, clause_flags, node_flags, IdSource, MergeClauseInfo, PropSource, TargetKind, TargetNode,
    TargetPath,
};

/// Output column carrying the `merge_clause` marker.
pub const MERGE_CLAUSE_COLUMN: &str = "_merge_clause";

/// Transforms a `MERGE` clause.
pub fn transform_merge(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    mc: &MergeClause,
) -> TransformResult<Query> {
    let mut query = Query::new();
    push_null_sentinel(&mut query);

    let mut flags = clause_flags::NONE;
    // the path is resolved exactly once; default aliases assigned here are
    // shared with the match transform below
    let mut path = mc.path.clone();

    let path_meta = if let Some(prev) = chain.prev() {
        flags |= clause_flags::PREVIOUS_CLAUSE;
        transform_merge_lateral(tx, &mut query, prev, &mut path)?
    } else {
        let mut meta = transform_merge_path(tx, &mut query, &mut path)?;
        // with nothing before it, the merge path itself becomes the
        // producing sub-query so existing paths flow out
        let as_match = merge_path_as_match(&path);
        let rte =
            tx.transform_clause_as_subquery(ClauseChain::single(&as_match), PREV_CLAUSE_ALIAS, true)?;
        tx.expand_rte_into_target_list(&mut query, rte);
        mark_tuple_positions(tx, &mut query, &mut meta)?;
        meta
    };

    if !chain.has_next() {
        flags |= clause_flags::TERMINAL;
    }

    let merge_function_attr = query.next_resno() as u32;
    let info = MergeClauseInfo {
        graph_name: tx.graph.name.clone(),
        graph_oid: tx.graph.oid,
        path: path_meta,
        merge_function_attr,
        flags,
    };
    push_clause_marker(
        &mut query,
        BuiltinFunc::MergeClauseMarker,
        MERGE_CLAUSE_COLUMN,
        metadata::encode(&info)?,
    );

    tx.finalize_query(&mut query, None);
    Ok(query)
}

fn merge_path_as_match(path: &Path) -> Clause {
    Clause::Match(MatchClause {
        optional: false,
        pattern: vec![path.clone()],
        where_clause: None,
        location: path.location,
    })
}

/// The previous clause and the merge-as-match sub-query joined by a
/// lateral left join, previous rows surviving unmatched.
fn transform_merge_lateral(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    prev: ClauseChain<'_>,
    path: &mut Path,
) -> TransformResult<TargetPath> {
    let l_rte = tx.transform_clause_as_subquery(prev, PREV_CLAUSE_ALIAS, false)?;
    tx.scope_mut().namespace.push(NsItem {
        rte: l_rte,
        rel_visible: false,
        cols_visible: true,
        lateral_only: true,
    });

    // resolve the merge path now: this is the only moment it is simple to
    // know whether a variable came from the merge or a previous clause
    let mut meta = transform_merge_path(tx, query, path)?;

    tx.scope_mut().lateral_active = true;
    let as_match = merge_path_as_match(path);
    let r_rte = tx.transform_clause_as_subquery(ClauseChain::single(&as_match), OPT_RIGHT_ALIAS, false)?;
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

    tx.expand_rte_into_target_list(query, join_rte);
    mark_tuple_positions(tx, query, &mut meta)?;
    Ok(meta)
}

/// Finds the target entry each merge entity will live in, wraps it so the
/// planner cannot prune it, and records the tuple position.
fn mark_tuple_positions(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    meta: &mut TargetPath,
) -> TransformResult<()> {
    if let Some(var_name) = &meta.var_name {
        let resno = tx.mark_target_volatile(query, var_name).ok_or(
            ErrorKind::InternalInvariantViolated("merge path variable is not in the target list"),
        )?;
        meta.path_position = resno as u32;
    }

    for node in &mut meta.target_nodes {
        if let Some(name) = &node.variable_name {
            let resno = tx.mark_target_volatile(query, name).ok_or(
                ErrorKind::InternalInvariantViolated("merge entity is not in the target list"),
            )?;
            node.tuple_position = resno as u32;
        }
    }
    Ok(())
}

/// Creates the target-node metadata for the merge path, assigning default
/// aliases so the match transform sees the same names.
fn transform_merge_path(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    path: &mut Path,
) -> TransformResult<TargetPath> {
    let in_path = path.var_name.is_some();
    let mut target_nodes = Vec::with_capacity(path.elements.len());

    for element in &mut path.elements {
        let mut node = match element {
            PathElementAst::Node(n) => transform_merge_node(tx, query, n)?,
            PathElementAst::Relationship(r) => transform_merge_edge(tx, query, r)?,
        };
        if in_path {
            node.flags |= node_flags::IN_PATH_VARIABLE;
        }
        target_nodes.push(node);
    }

    Ok(TargetPath {
        var_name: path.var_name.clone(),
        path_position: 0,
        target_nodes,
    })
}

/// Edges in a `MERGE` must be newly bound and labeled.
fn transform_merge_edge(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    edge: &mut RelPattern,
) -> TransformResult<TargetNode> {
    let mut flags = node_flags::INSERT;

    if let Some(name) = &edge.name {
        if tx.find_entity_kind(name, EntityKind::Edge).is_some() {
            return Err(TransformError::at(
                ErrorKind::VariableRedeclared { name: name.clone() },
                edge.location,
            ));
        }
        flags |= node_flags::IS_VARIABLE;
    } else {
        edge.name = Some(tx.next_default_alias());
    }

    let label = edge.label.clone().ok_or_else(|| {
        TransformError::at(ErrorKind::EdgeLabelRequired { clause: "MERGE" }, edge.location)
    })?;

    let relid = tx.catalog.ensure_label(
        tx.graph.oid,
        &label,
        LabelKind::Edge,
        LabelKind::Edge.default_label(),
    )?;
    let relation = tx.catalog.label_relation_name(tx.graph.oid, relid)?;
    let prop_source = merge_prop_source(tx, query, edge.props.as_ref(), edge.location)?;

    Ok(TargetNode {
        kind: TargetKind::Edge,
        label_name: label,
        variable_name: edge.name.clone(),
        relid: relid.0,
        id_source: IdSource::LabelSequence { relation },
        prop_source,
        tuple_position: 0,
        dir: Some(edge.dir.to_wire()),
        flags,
    })
}

fn transform_merge_node(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    node: &mut NodePattern,
) -> TransformResult<TargetNode> {
    let mut flags = 0u32;

    if let Some(name) = &node.name {
        // a vertex bound by an earlier clause needs no creation setup;
        // only its id is referenced at execution time
        if tx.find_entity_kind(name, EntityKind::Vertex).is_some() {
            return Ok(TargetNode {
                kind: TargetKind::Vertex,
                label_name: String::new(),
                variable_name: Some(name.clone()),
                relid: 0,
                id_source: IdSource::None,
                prop_source: PropSource::Default,
                tuple_position: 0,
                dir: None,
                flags: node_flags::MERGE_EXISTS,
            });
        }
        flags |= node_flags::IS_VARIABLE;
    } else {
        node.name = Some(tx.next_default_alias());
    }

    let label_display = node.label.clone().unwrap_or_default();
    let label = node
        .label
        .clone()
        .unwrap_or_else(|| LabelKind::Vertex.default_label().to_owned());

    let relid = tx.catalog.ensure_label(
        tx.graph.oid,
        &label,
        LabelKind::Vertex,
        LabelKind::Vertex.default_label(),
    )?;
    let relation = tx.catalog.label_relation_name(tx.graph.oid, relid)?;

    flags |= node_flags::INSERT;
    let prop_source = merge_prop_source(tx, query, node.props.as_ref(), node.location)?;

    Ok(TargetNode {
        kind: TargetKind::Vertex,
        label_name: label_display,
        variable_name: node.name.clone(),
        relid: relid.0,
        id_source: IdSource::LabelSequence { relation },
        prop_source,
        tuple_position: 0,
        dir: None,
        flags,
    })
}

/// Resolves the property source of a merge entity without growing the
/// target list when the source is self-describing; general expressions
/// ride along as an extra protected column.
fn merge_prop_source(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    props: Option<&crate::ast::Expr>,
    _location: crate::ast::Location,
) -> TransformResult<PropSource> {
    let Some(props) = props else {
        return Ok(PropSource::Default);
    };
    if let crate::ast::Expr::Parameter(name) = props {
        return Ok(PropSource::Parameter(name.clone()));
    }

    let expr = transform_expr(tx, props, ExprKind::InsertTarget)?;
    if let crate::rel::Expr::Literal(value) = &expr {
        let blob = crate::bdm::Bdm::build(value)?;
        return Ok(PropSource::Literal(blob.as_bytes().to_vec()));
    }

    let alias = tx.next_default_alias();
    let resno = query.next_resno();
    query.target_list.push(crate::rel::TargetEntry {
        expr: crate::transform::context::wrap_volatile(expr),
        name: alias,
        resno,
        junk: false,
    });
    Ok(PropSource::TupleColumn(resno as u32))
}
