//! `CREATE`.
//!
//! Transforms a create pattern into a query that passes the previous
//! clause's columns through and carries a `create_clause` marker whose
//! payload describes every entity to insert: label, id source, property
//! source, and the tuple columns later clauses reference them by.

use crate::ast::{CreateClause, NodePattern, Path, PathElementAst, RelDir, RelPattern};
use crate::catalog::LabelKind;
use crate::rel::{BuiltinFunc, Expr, Query, TargetEntry, ValueType};
use crate::transform::context::{
    push_null_sentinel, wrap_volatile, ClauseChain, Transformer, PREV_CLAUSE_ALIAS,
};
use crate::transform::entity::{EntityKind, TransformEntity};
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::{transform_expr, ExprKind};
use crate::transform::metadata::{
    self, clause_flags, node_flags, CreateClauseInfo, IdSource, PropSource, TargetKind,
    TargetNode, TargetPath,
};

/// Output column carrying the `create_clause` marker.
pub const CREATE_CLAUSE_COLUMN: &str = "_create_clause";

/// Transforms a `CREATE` clause.
pub fn transform_create(
    tx: &mut Transformer<'_>,
    chain: ClauseChain<'_>,
    cc: &CreateClause,
) -> TransformResult<Query> {
    let mut query = Query::new();
    let mut flags = clause_flags::NONE;

    push_null_sentinel(&mut query);

    if let Some(prev) = chain.prev() {
        tx.handle_prev_clause(&mut query, prev)?;
        flags |= clause_flags::PREVIOUS_CLAUSE;
    }

    let mut paths = Vec::with_capacity(cc.pattern.len());
    for path in &cc.pattern {
        paths.push(transform_create_path(tx, &mut query, path)?);
    }

    if !chain.has_next() {
        flags |= clause_flags::TERMINAL;
    }

    let info = CreateClauseInfo {
        graph_name: tx.graph.name.clone(),
        graph_oid: tx.graph.oid,
        paths,
        flags,
    };
    push_clause_marker(
        &mut query,
        BuiltinFunc::CreateClauseMarker,
        CREATE_CLAUSE_COLUMN,
        metadata::encode(&info)?,
    );

    tx.finalize_query(&mut query, None);
    Ok(query)
}

/// Appends a marker function call carrying serialized clause metadata.
pub(crate) fn push_clause_marker(
    query: &mut Query,
    func: BuiltinFunc,
    column: &str,
    blob: Vec<u8>,
) {
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: Expr::Func {
            func,
            args: vec![Expr::Blob(blob)],
            ty: ValueType::Document,
        },
        name: column.to_owned(),
        resno,
        junk: false,
    });
}

fn transform_create_path(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    path: &Path,
) -> TransformResult<TargetPath> {
    let in_path = path.var_name.is_some();
    let mut target_nodes = Vec::with_capacity(path.elements.len());

    for element in &path.elements {
        let mut node = match element {
            PathElementAst::Node(n) => {
                let mut n = n.clone();
                let target = transform_create_node(tx, query, &mut n)?;
                tx.scope_mut().entities.add(TransformEntity::new(
                    EntityKind::Vertex,
                    n.name.clone(),
                    None,
                ));
                target
            }
            PathElementAst::Relationship(r) => {
                let mut r = r.clone();
                let target = transform_create_edge(tx, query, &mut r)?;
                tx.scope_mut().entities.add(TransformEntity::new(
                    EntityKind::Edge,
                    r.name.clone(),
                    None,
                ));
                target
            }
        };
        if in_path {
            node.flags |= node_flags::IN_PATH_VARIABLE;
        }
        target_nodes.push(node);
    }

    // a named path gets a placeholder slot the executor fills with the
    // materialized traversal
    let mut path_position = 0u32;
    if let Some(var_name) = &path.var_name {
        if target_nodes.is_empty() {
            return Err(TransformError::at(
                ErrorKind::InternalInvariantViolated("paths require at least one vertex"),
                path.location,
            ));
        }
        let resno = query.next_resno();
        query.target_list.push(TargetEntry {
            expr: Expr::Null {
                ty: ValueType::Traversal,
            },
            name: var_name.clone(),
            resno,
            junk: false,
        });
        path_position = resno as u32;
    }

    Ok(TargetPath {
        var_name: path.var_name.clone(),
        path_position,
        target_nodes,
    })
}

fn transform_create_edge(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    edge: &mut RelPattern,
) -> TransformResult<TargetNode> {
    if let Some(label) = &edge.label {
        if let Some(entry) = tx.catalog.label_by_name(tx.graph.oid, label) {
            if entry.kind != LabelKind::Edge {
                return Err(TransformError::at(
                    ErrorKind::LabelKindMismatch {
                        label: label.clone(),
                        actual: entry.kind.as_str(),
                        expected: "edge",
                    },
                    edge.location,
                ));
            }
        }
    }

    let mut flags = node_flags::INSERT;
    let mut tuple_position = 0u32;
    let variable_name = edge.name.clone();

    if let Some(name) = &edge.name {
        // a variable can be declared here, but not re-used if it exists
        if variable_exists(tx, name) {
            return Err(TransformError::at(
                ErrorKind::VariableRedeclared { name: name.clone() },
                edge.location,
            ));
        }
        let resno = query.next_resno();
        query.target_list.push(TargetEntry {
            expr: Expr::Null {
                ty: ValueType::Edge,
            },
            name: name.clone(),
            resno,
            junk: false,
        });
        tuple_position = resno as u32;
        flags |= node_flags::IS_VARIABLE;
    }

    if edge.dir == RelDir::None {
        return Err(TransformError::at(
            ErrorKind::DirectedRelationshipRequired,
            edge.location,
        ));
    }

    let label = edge.label.clone().ok_or_else(|| {
        TransformError::at(ErrorKind::EdgeLabelRequired { clause: "CREATE" }, edge.location)
    })?;

    // missing labels are created under the graph, inheriting the default
    let relid = tx.catalog.ensure_label(
        tx.graph.oid,
        &label,
        LabelKind::Edge,
        LabelKind::Edge.default_label(),
    )?;
    let relation = tx.catalog.label_relation_name(tx.graph.oid, relid)?;

    let prop_source = create_properties(tx, query, edge.props.as_ref(), &relation, edge.location)?;

    Ok(TargetNode {
        kind: TargetKind::Edge,
        label_name: label,
        variable_name,
        relid: relid.0,
        id_source: IdSource::LabelSequence { relation },
        prop_source,
        tuple_position,
        dir: Some(edge.dir.to_wire()),
        flags,
    })
}

fn transform_create_node(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    node: &mut NodePattern,
) -> TransformResult<TargetNode> {
    if let Some(label) = &node.label {
        if let Some(entry) = tx.catalog.label_by_name(tx.graph.oid, label) {
            if entry.kind != LabelKind::Vertex {
                return Err(TransformError::at(
                    ErrorKind::LabelKindMismatch {
                        label: label.clone(),
                        actual: entry.kind.as_str(),
                        expected: "vertex",
                    },
                    node.location,
                ));
            }
        }
    }

    if let Some(name) = &node.name {
        let existing = tx
            .find_entity_current(name)
            .map(|e| (e.kind, e.declared_in_current_clause));
        if let Some((kind, declared_same_clause)) = existing {
            if kind != EntityKind::Vertex {
                return Err(TransformError::at(
                    ErrorKind::VariableRedeclared { name: name.clone() },
                    node.location,
                ));
            }
            return transform_create_existing_node(tx, query, declared_same_clause, node);
        }
    }

    transform_create_new_node(tx, query, node)
}

/// A previously declared vertex in a `CREATE` clause: only its id is
/// extracted at runtime, and when it was declared in this same clause some
/// existence checks can be skipped.
fn transform_create_existing_node(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    declared_in_current_clause: bool,
    node: &NodePattern,
) -> TransformResult<TargetNode> {
    if node.props.is_some() || node.label.is_some() {
        return Err(TransformError::at(
            ErrorKind::VariableRedeclared {
                name: node.name.clone().unwrap_or_default(),
            },
            node.location,
        ));
    }

    let name = node
        .name
        .clone()
        .ok_or(ErrorKind::InternalInvariantViolated("existing node without a name"))?;

    let mut flags = 0;
    if declared_in_current_clause {
        flags |= node_flags::EXISTING_DECLARED_SAME_CLAUSE;
    }

    let tuple_position = tx
        .mark_target_volatile(query, &name)
        .ok_or(ErrorKind::InternalInvariantViolated(
            "existing variable is not in the target list",
        ))?;

    Ok(TargetNode {
        kind: TargetKind::Vertex,
        label_name: String::new(),
        variable_name: Some(name),
        relid: 0,
        id_source: IdSource::None,
        prop_source: PropSource::Default,
        tuple_position: tuple_position as u32,
        dir: None,
        flags,
    })
}

fn transform_create_new_node(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    node: &mut NodePattern,
) -> TransformResult<TargetNode> {
    // an unlabeled vertex lands in the generic label all labels descend
    // from; the metadata records the label as unnamed
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

    let mut flags = node_flags::INSERT;
    let prop_source = create_properties(tx, query, node.props.as_ref(), &relation, node.location)?;

    let mut tuple_position = 0u32;
    let variable_name = node.name.clone();
    if let Some(name) = &node.name {
        let resno = query.next_resno();
        query.target_list.push(TargetEntry {
            expr: Expr::Null {
                ty: ValueType::Vertex,
            },
            name: name.clone(),
            resno,
            junk: false,
        });
        tuple_position = resno as u32;
        flags |= node_flags::IS_VARIABLE;
    } else {
        node.name = Some(tx.next_default_alias());
    }

    Ok(TargetNode {
        kind: TargetKind::Vertex,
        label_name: label_display,
        variable_name,
        relid: relid.0,
        id_source: IdSource::LabelSequence { relation },
        prop_source,
        tuple_position,
        dir: None,
        flags,
    })
}

/// Builds the property target entry for a new entity and returns the
/// tuple column it lands in. Parameterized properties are rejected here;
/// an absent map falls back to the relation default.
fn create_properties(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    props: Option<&crate::ast::Expr>,
    relation: &str,
    location: crate::ast::Location,
) -> TransformResult<PropSource> {
    let expr = match props {
        Some(crate::ast::Expr::Parameter(_)) => {
            return Err(TransformError::at(
                ErrorKind::ParameterPropertiesUnsupported,
                location,
            ))
        }
        Some(expr) => transform_expr(tx, expr, ExprKind::InsertTarget)?,
        None => Expr::Func {
            func: BuiltinFunc::DefaultProperties,
            args: vec![Expr::Literal(crate::bdm::BdmValue::String(
                relation.to_owned(),
            ))],
            ty: ValueType::Document,
        },
    };

    let alias = tx.next_default_alias();
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: wrap_volatile(expr),
        name: alias,
        resno,
        junk: false,
    });
    Ok(PropSource::TupleColumn(resno as u32))
}

/// Does the previous clause already expose this name as a column?
fn variable_exists(tx: &Transformer<'_>, name: &str) -> bool {
    let scope = tx.scope();
    scope
        .rte_by_alias(PREV_CLAUSE_ALIAS)
        .map(|rte| {
            scope.range_table[rte]
                .columns
                .iter()
                .any(|col| col.name == name)
        })
        .unwrap_or(false)
}
