//! Pattern resolver.
//!
//! Turns a linear path pattern into transform entities, join quals,
//! label-id filters, property-containment predicates, variable-length
//! range functions, and the edge-uniqueness predicate. Joins are driven by
//! edges: each edge contributes direction-aware equality quals against its
//! neighbouring vertices, or a label-id filter when the vertex never
//! entered the join tree.

use smallvec::SmallVec;

use crate::ast::{NodePattern, Path, PathElementAst, RelDir, RelPattern};
use crate::bdm::BdmValue;
use crate::catalog::{LabelKind, DEFAULT_VERTEX_LABEL};
use crate::rel::{
    BoolOp, BuiltinFunc, CmpOp, ColumnRef, Expr, FromItem, Query, RangeTableEntry, RteColumn,
    RteKind, TargetEntry, ValueType,
};
use crate::transform::context::{NsItem, Transformer};
use crate::transform::entity::{EntityKind, TransformEntity};
use crate::transform::errors::{ErrorKind, TransformError, TransformResult};
use crate::transform::expr::{and_quals, coerce_to_bool, transform_expr, ExprKind};

/// Which side of an edge an entity joins on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum JoinSide {
    Left,
    Right,
}

const VERTEX_COL_ID: usize = 1;
const VERTEX_COL_PROPERTIES: usize = 2;
const EDGE_COL_ID: usize = 1;
const EDGE_COL_START_ID: usize = 2;
const EDGE_COL_END_ID: usize = 3;
const EDGE_COL_PROPERTIES: usize = 4;

fn vertex_columns() -> Vec<RteColumn> {
    vec![
        RteColumn {
            name: "id".into(),
            ty: ValueType::GraphId,
        },
        RteColumn {
            name: "properties".into(),
            ty: ValueType::Document,
        },
    ]
}

fn edge_columns() -> Vec<RteColumn> {
    vec![
        RteColumn {
            name: "id".into(),
            ty: ValueType::GraphId,
        },
        RteColumn {
            name: "start_id".into(),
            ty: ValueType::GraphId,
        },
        RteColumn {
            name: "end_id".into(),
            ty: ValueType::GraphId,
        },
        RteColumn {
            name: "properties".into(),
            ty: ValueType::Document,
        },
    ]
}

/// A vertex enters the join tree when the path is named or the vertex is
/// named, labeled, or property-constrained.
fn include_vertex(path_named: bool, node: &NodePattern) -> bool {
    path_named || node.name.is_some() || node.label.is_some() || node.props.is_some()
}

/// Transforms every path of a `MATCH` pattern and installs the combined
/// qual (path joins, property containment, `WHERE`) on the query.
pub fn transform_match_pattern(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    pattern: &[Path],
    where_clause: Option<&crate::ast::Expr>,
) -> TransformResult<()> {
    let mut quals = Vec::new();
    for path in pattern {
        quals.extend(transform_match_path(tx, query, path)?);
    }

    let mut qual = and_quals(quals);

    let property_quals = std::mem::take(&mut tx.scope_mut().property_quals);
    if let Some(prop_qual) = and_quals(property_quals) {
        qual = Some(match qual {
            Some(q) => Expr::Bool {
                op: BoolOp::And,
                args: vec![q, prop_qual],
            },
            None => prop_qual,
        });
    }

    if let Some(filter) = where_clause {
        let where_qual = coerce_to_bool(transform_expr(tx, filter, ExprKind::Where)?);
        qual = Some(match qual {
            Some(q) => Expr::Bool {
                op: BoolOp::And,
                args: vec![q, where_qual],
            },
            None => where_qual,
        });
    }

    tx.finalize_query(query, qual.map(coerce_to_bool));
    Ok(())
}

/// Transforms one path: its entities, the optional path variable, the
/// join quals, and the edge-uniqueness predicate.
fn transform_match_path(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    path: &Path,
) -> TransformResult<Vec<Expr>> {
    let entities = transform_match_entities(tx, query, path)?;

    if let Some(var_name) = &path.var_name {
        let element_exprs: Vec<Expr> = entities
            .iter()
            .filter_map(|e| e.expr.clone())
            .collect();
        let resno = query.next_resno();
        query.target_list.push(TargetEntry {
            expr: Expr::Func {
                func: BuiltinFunc::BuildTraversal,
                args: element_exprs,
                ty: ValueType::Traversal,
            },
            name: var_name.clone(),
            resno,
            junk: false,
        });
    }

    let mut quals = make_path_join_quals(tx, &entities)?;

    // two or more edges in one path require pairwise-distinct edge ids
    if entities.len() > 3 {
        quals.push(prevent_duplicate_edges(tx, &entities)?);
    }

    Ok(quals)
}

/// Walks the path elements, resolving vertices and edges into transform
/// entities. Variable-length edges resolve their right vertex first, then
/// range a lateral set-returning call producing the `edges` column.
fn transform_match_entities(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    path: &Path,
) -> TransformResult<Vec<TransformEntity>> {
    let path_named = path.var_name.is_some();
    let mut elements = path.elements.clone();
    let mut entities: Vec<TransformEntity> = Vec::with_capacity(elements.len());

    let mut i = 0;
    while i < elements.len() {
        if i % 2 == 0 {
            let entity = handle_vertex(tx, query, path_named, &mut elements, i)?;
            entities.push(entity);
            i += 1;
        } else {
            let is_varlen = matches!(
                &elements[i],
                PathElementAst::Relationship(rel) if rel.varlen.is_some()
            );
            if !is_varlen {
                let prev_in_join_tree = entities
                    .last()
                    .map(|e| e.in_join_tree)
                    .unwrap_or(false);
                let entity =
                    handle_edge(tx, query, path_named, &mut elements, i, prev_in_join_tree)?;
                entities.push(entity);
                i += 1;
            } else {
                // the right vertex must be resolvable by name before the
                // range function can reference it
                if let Some(PathElementAst::Node(node)) = elements.get_mut(i + 1) {
                    if !include_vertex(path_named, node) && node.name.is_none() {
                        node.name = Some(tx.next_default_alias());
                    }
                } else {
                    return Err(ErrorKind::InternalInvariantViolated(
                        "variable-length edge without a following vertex",
                    )
                    .into());
                }
                let next_entity = handle_vertex(tx, query, path_named, &mut elements, i + 1)?;

                let prev_name = entities
                    .last()
                    .and_then(|e| e.name.clone())
                    .ok_or(ErrorKind::InternalInvariantViolated(
                        "variable-length edge without a named left vertex",
                    ))?;
                let next_name = next_entity.name.clone().ok_or(
                    ErrorKind::InternalInvariantViolated(
                        "variable-length edge without a named right vertex",
                    ),
                )?;

                let vle_entity = match &mut elements[i] {
                    PathElementAst::Relationship(rel) => {
                        transform_vle_edge(tx, query, rel, &prev_name, &next_name)?
                    }
                    PathElementAst::Node(_) => {
                        return Err(ErrorKind::InternalInvariantViolated(
                            "vertex at an edge position",
                        )
                        .into())
                    }
                };
                entities.push(vle_entity);
                entities.push(next_entity);
                i += 2;
            }
        }
    }

    Ok(entities)
}

fn handle_vertex(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    path_named: bool,
    elements: &mut [PathElementAst],
    i: usize,
) -> TransformResult<TransformEntity> {
    // a vertex adjacent to a variable-length edge always needs a name,
    // even when it would otherwise stay out of the join tree
    let next_is_varlen = matches!(
        elements.get(i + 1),
        Some(PathElementAst::Relationship(rel)) if rel.varlen.is_some()
    );
    {
        let PathElementAst::Node(node) = &mut elements[i] else {
            return Err(ErrorKind::InternalInvariantViolated("edge at a vertex position").into());
        };
        if node.name.is_none() && !include_vertex(path_named, node) && next_is_varlen {
            node.name = Some(tx.next_default_alias());
        }
    }

    let PathElementAst::Node(node) = &mut elements[i] else {
        return Err(ErrorKind::InternalInvariantViolated("edge at a vertex position").into());
    };
    let output = include_vertex(path_named, node);
    let (expr, rte) = transform_node_pattern(tx, query, node, output)?;

    let mut entity = TransformEntity::new(EntityKind::Vertex, node.name.clone(), expr);
    entity.label = node.label.clone();
    entity.has_props = node.props.is_some();
    entity.rte = rte;

    if let Some(props) = &node.props {
        let qual = property_constraint(tx, &entity, props)?;
        tx.scope_mut().property_quals.push(qual);
    }

    tx.scope_mut().entities.add(entity.clone());
    Ok(entity)
}

fn handle_edge(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    path_named: bool,
    elements: &mut [PathElementAst],
    i: usize,
    prev_in_join_tree: bool,
) -> TransformResult<TransformEntity> {
    // a single bidirectional edge between two out-of-tree vertices needs
    // one vertex forced into the join tree so output generation works
    let force_far_vertex = {
        let PathElementAst::Relationship(rel) = &elements[i] else {
            return Err(ErrorKind::InternalInvariantViolated("vertex at an edge position").into());
        };
        elements.len() == 3 && rel.dir == RelDir::None && !prev_in_join_tree
    };
    if force_far_vertex {
        if let Some(PathElementAst::Node(node)) = elements.get_mut(2) {
            if !include_vertex(path_named, node) {
                node.name = Some(tx.next_default_alias());
            }
        }
    }

    let PathElementAst::Relationship(rel) = &mut elements[i] else {
        return Err(ErrorKind::InternalInvariantViolated("vertex at an edge position").into());
    };
    let (expr, rte) = transform_edge_pattern(tx, query, rel)?;

    let mut entity = TransformEntity::new(EntityKind::Edge, rel.name.clone(), expr);
    entity.label = rel.label.clone();
    entity.has_props = rel.props.is_some();
    entity.rte = rte;
    entity.dir = Some(rel.dir);

    if let Some(props) = &rel.props {
        let qual = property_constraint(tx, &entity, props)?;
        tx.scope_mut().property_quals.push(qual);
    }

    tx.scope_mut().entities.add(entity.clone());
    Ok(entity)
}

/// Resolves or binds a vertex variable and builds its expression.
fn transform_node_pattern(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    node: &mut NodePattern,
    output: bool,
) -> TransformResult<(Option<Expr>, Option<usize>)> {
    match &node.label {
        None => node.label = Some(DEFAULT_VERTEX_LABEL.to_owned()),
        Some(label) => {
            let entry = tx
                .catalog
                .label_by_name(tx.graph.oid, label)
                .ok_or_else(|| {
                    TransformError::at(
                        ErrorKind::NotFound {
                            label: label.clone(),
                        },
                        node.location,
                    )
                })?;
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

    if !output {
        return Ok((None, None));
    }

    if let Some(name) = &node.name {
        // inside a WHERE only existing variables may be referenced
        if tx.scope().where_mode {
            return match tx.find_entity(name) {
                Some(entity) => Ok((entity.expr.clone(), None)),
                None => Err(TransformError::at(
                    ErrorKind::UndefinedVariable { name: name.clone() },
                    node.location,
                )),
            };
        }

        if let Some(column) = tx.lookup_column(name) {
            return Ok((Some(column), None));
        }

        if let Some(te) = query.find_target(name) {
            let te_expr = te.expr.clone();
            if let Some(entity) = tx.find_entity_current(name) {
                let default_label = node.label.as_deref() == Some(DEFAULT_VERTEX_LABEL);
                if entity.kind != EntityKind::Vertex || !default_label || node.props.is_some() {
                    return Err(TransformError::at(
                        ErrorKind::VariableRedeclared { name: name.clone() },
                        node.location,
                    ));
                }
            }
            return Ok((Some(te_expr), None));
        }
    } else {
        node.name = Some(tx.next_default_alias());
    }

    let label = node.label.clone().unwrap_or_default();
    let name = node.name.clone().unwrap_or_default();
    let entry = tx
        .catalog
        .label_by_name(tx.graph.oid, &label)
        .ok_or_else(|| {
            TransformError::at(ErrorKind::NotFound { label: label.clone() }, node.location)
        })?;

    let scope = tx.scope_mut();
    let rte = scope.add_rte(RangeTableEntry {
        alias: name.clone(),
        kind: RteKind::Relation {
            relation: entry.relation,
            label: entry.id,
        },
        columns: vertex_columns(),
    });
    scope.namespace.push(NsItem {
        rte,
        rel_visible: true,
        cols_visible: true,
        lateral_only: false,
    });

    let expr = make_vertex_expr(tx, rte);
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: expr.clone(),
        name,
        resno,
        junk: false,
    });

    Ok((Some(expr), Some(rte)))
}

/// Resolves or binds an edge variable and builds its expression.
fn transform_edge_pattern(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    rel: &mut RelPattern,
) -> TransformResult<(Option<Expr>, Option<usize>)> {
    match &rel.label {
        None => rel.label = Some(crate::catalog::DEFAULT_EDGE_LABEL.to_owned()),
        Some(label) => {
            let entry = tx
                .catalog
                .label_by_name(tx.graph.oid, label)
                .ok_or_else(|| {
                    TransformError::at(
                        ErrorKind::NotFound {
                            label: label.clone(),
                        },
                        rel.location,
                    )
                })?;
            if entry.kind != LabelKind::Edge {
                return Err(TransformError::at(
                    ErrorKind::LabelKindMismatch {
                        label: label.clone(),
                        actual: entry.kind.as_str(),
                        expected: "edge",
                    },
                    rel.location,
                ));
            }
        }
    }

    if let Some(name) = &rel.name {
        if tx.scope().where_mode {
            return match tx.find_entity(name) {
                Some(entity) => Ok((entity.expr.clone(), None)),
                None => Err(TransformError::at(
                    ErrorKind::UndefinedVariable { name: name.clone() },
                    rel.location,
                )),
            };
        }

        if let Some(column) = tx.lookup_column(name) {
            return Ok((Some(column), None));
        }

        if let Some(te) = query.find_target(name) {
            let te_expr = te.expr.clone();
            if let Some(entity) = tx.find_entity_current(name) {
                let default_label =
                    rel.label.as_deref() == Some(crate::catalog::DEFAULT_EDGE_LABEL);
                if entity.kind != EntityKind::Edge || !default_label || rel.props.is_some() {
                    return Err(TransformError::at(
                        ErrorKind::VariableRedeclared { name: name.clone() },
                        rel.location,
                    ));
                }
            }
            return Ok((Some(te_expr), None));
        }
    } else {
        rel.name = Some(tx.next_default_alias());
    }

    let label = rel.label.clone().unwrap_or_default();
    let name = rel.name.clone().unwrap_or_default();
    let entry = tx
        .catalog
        .label_by_name(tx.graph.oid, &label)
        .ok_or_else(|| {
            TransformError::at(ErrorKind::NotFound { label: label.clone() }, rel.location)
        })?;

    let scope = tx.scope_mut();
    let rte = scope.add_rte(RangeTableEntry {
        alias: name.clone(),
        kind: RteKind::Relation {
            relation: entry.relation,
            label: entry.id,
        },
        columns: edge_columns(),
    });
    // the relation is visible by alias but its raw columns are not
    scope.namespace.push(NsItem {
        rte,
        rel_visible: true,
        cols_visible: false,
        lateral_only: false,
    });

    let expr = make_edge_expr(tx, rte);
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: expr.clone(),
        name,
        resno,
        junk: false,
    });

    Ok((Some(expr), Some(rte)))
}

/// Ranges the variable-length set-returning call as a lateral function
/// with a single `edges` output column, and registers its entity.
fn transform_vle_edge(
    tx: &mut Transformer<'_>,
    query: &mut Query,
    rel: &mut RelPattern,
    prev_name: &str,
    next_name: &str,
) -> TransformResult<TransformEntity> {
    if rel.name.is_none() {
        rel.name = Some(tx.next_default_alias());
    }
    let name = rel.name.clone().unwrap_or_default();

    let start = crate::transform::expr::resolve_variable(tx, prev_name)?;
    let end = crate::transform::expr::resolve_variable(tx, next_name)?;

    let label_arg = match &rel.label {
        Some(label) => Expr::Literal(BdmValue::String(label.clone())),
        None => Expr::Null {
            ty: ValueType::Document,
        },
    };
    let props_arg = match &rel.props {
        Some(props) => transform_expr(tx, props, ExprKind::Where)?,
        None => Expr::Null {
            ty: ValueType::Document,
        },
    };
    let template = Expr::Func {
        func: BuiltinFunc::BuildVleEdgeTemplate,
        args: vec![label_arg, props_arg],
        ty: ValueType::Document,
    };

    let (lo, hi) = match &rel.varlen {
        Some(range) => {
            let lo = match &range.lo {
                Some(expr) => transform_expr(tx, expr, ExprKind::Where)?,
                None => Expr::Null {
                    ty: ValueType::Document,
                },
            };
            let hi = match &range.hi {
                Some(expr) => transform_expr(tx, expr, ExprKind::Where)?,
                None => Expr::Null {
                    ty: ValueType::Document,
                },
            };
            (lo, hi)
        }
        None => (
            Expr::Null {
                ty: ValueType::Document,
            },
            Expr::Null {
                ty: ValueType::Document,
            },
        ),
    };

    let call = Expr::Func {
        func: BuiltinFunc::Vle,
        args: vec![
            Expr::Literal(BdmValue::String(tx.graph.name.clone())),
            start,
            end,
            template,
            lo,
            hi,
            Expr::Literal(BdmValue::Int(rel.dir.to_wire())),
        ],
        ty: ValueType::VariableEdge,
    };

    let scope = tx.scope_mut();
    let rte = scope.add_rte(RangeTableEntry {
        alias: name.clone(),
        kind: RteKind::Function {
            call,
            lateral: true,
        },
        columns: vec![RteColumn {
            name: "edges".into(),
            ty: ValueType::VariableEdge,
        }],
    });
    scope.joinlist.push(FromItem::RteRef(rte));
    scope.namespace.push(NsItem {
        rte,
        rel_visible: true,
        cols_visible: false,
        lateral_only: false,
    });

    let var = Expr::Column(ColumnRef {
        level: 0,
        rte,
        attno: 1,
        name: "edges".into(),
        ty: ValueType::VariableEdge,
    });
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: var.clone(),
        name: name.clone(),
        resno,
        junk: false,
    });

    let mut entity = TransformEntity::new(EntityKind::VleEdge, Some(name), Some(var));
    entity.label = rel.label.clone();
    entity.has_props = rel.props.is_some();
    entity.rte = Some(rte);
    entity.dir = Some(rel.dir);

    tx.scope_mut().entities.add(entity.clone());
    Ok(entity)
}

/// `entity.properties @> constraint`.
fn property_constraint(
    tx: &mut Transformer<'_>,
    entity: &TransformEntity,
    props: &crate::ast::Expr,
) -> TransformResult<Expr> {
    let prop_expr = properties_of(entity)?;
    let constraint = transform_expr(tx, props, ExprKind::Where)?;
    Ok(Expr::Comparison {
        op: CmpOp::Contains,
        left: Box::new(prop_expr),
        right: Box::new(constraint),
    })
}

fn properties_of(entity: &TransformEntity) -> TransformResult<Expr> {
    if let Some(rte) = entity.rte {
        let attno = match entity.kind {
            EntityKind::Vertex => VERTEX_COL_PROPERTIES,
            EntityKind::Edge => EDGE_COL_PROPERTIES,
            EntityKind::VleEdge => {
                return Err(ErrorKind::InternalInvariantViolated(
                    "property constraint on a variable-length edge entity",
                )
                .into())
            }
        };
        return Ok(Expr::Column(ColumnRef {
            level: 0,
            rte,
            attno,
            name: "properties".into(),
            ty: ValueType::Document,
        }));
    }
    match &entity.expr {
        Some(expr) => Ok(Expr::Func {
            func: BuiltinFunc::EntityProperties,
            args: vec![expr.clone()],
            ty: ValueType::Document,
        }),
        None => Err(ErrorKind::InternalInvariantViolated(
            "property constraint on an entity without an expression",
        )
        .into()),
    }
}

fn make_vertex_expr(tx: &Transformer<'_>, rte: usize) -> Expr {
    let id = Expr::Column(ColumnRef {
        level: 0,
        rte,
        attno: VERTEX_COL_ID,
        name: "id".into(),
        ty: ValueType::GraphId,
    });
    let props = Expr::Column(ColumnRef {
        level: 0,
        rte,
        attno: VERTEX_COL_PROPERTIES,
        name: "properties".into(),
        ty: ValueType::Document,
    });
    let label_name = Expr::Func {
        func: BuiltinFunc::LabelName,
        args: vec![
            Expr::Literal(BdmValue::Int(tx.graph.oid as i64)),
            id.clone(),
        ],
        ty: ValueType::Text,
    };
    Expr::Func {
        func: BuiltinFunc::BuildVertex,
        args: vec![id, label_name, props],
        ty: ValueType::Vertex,
    }
}

fn make_edge_expr(tx: &Transformer<'_>, rte: usize) -> Expr {
    let col = |attno: usize, name: &str| {
        Expr::Column(ColumnRef {
            level: 0,
            rte,
            attno,
            name: name.into(),
            ty: ValueType::GraphId,
        })
    };
    let id = col(EDGE_COL_ID, "id");
    let label_name = Expr::Func {
        func: BuiltinFunc::LabelName,
        args: vec![
            Expr::Literal(BdmValue::Int(tx.graph.oid as i64)),
            id.clone(),
        ],
        ty: ValueType::Text,
    };
    let props = Expr::Column(ColumnRef {
        level: 0,
        rte,
        attno: EDGE_COL_PROPERTIES,
        name: "properties".into(),
        ty: ValueType::Document,
    });
    Expr::Func {
        func: BuiltinFunc::BuildEdge,
        args: vec![
            id,
            col(EDGE_COL_START_ID, "start_id"),
            col(EDGE_COL_END_ID, "end_id"),
            label_name,
            props,
        ],
        ty: ValueType::Edge,
    }
}

/// Column access or accessor-function call for one field of an entity.
fn make_qual(entity: &TransformEntity, column: &str) -> TransformResult<Expr> {
    if let Some(expr @ Expr::Column(_)) = &entity.expr {
        // the entity is a variable from an earlier clause; go through the
        // value accessors instead of a relation column
        let func = match (entity.kind, column) {
            (EntityKind::Vertex, "id") => BuiltinFunc::EntityId,
            (EntityKind::Vertex, "properties") => BuiltinFunc::EntityProperties,
            (EntityKind::Edge, "id") => BuiltinFunc::EntityId,
            (EntityKind::Edge, "start_id") => BuiltinFunc::EntityStartId,
            (EntityKind::Edge, "end_id") => BuiltinFunc::EntityEndId,
            (EntityKind::Edge, "properties") => BuiltinFunc::EntityProperties,
            _ => {
                return Err(ErrorKind::InternalInvariantViolated(
                    "no accessor for entity column",
                )
                .into())
            }
        };
        let ty = if column == "properties" {
            ValueType::Document
        } else {
            ValueType::GraphId
        };
        return Ok(Expr::Func {
            func,
            args: vec![expr.clone()],
            ty,
        });
    }

    let rte = entity
        .rte
        .ok_or(ErrorKind::InternalInvariantViolated("entity without a relation"))?;
    let attno = match (entity.kind, column) {
        (EntityKind::Vertex, "id") => VERTEX_COL_ID,
        (EntityKind::Vertex, "properties") => VERTEX_COL_PROPERTIES,
        (EntityKind::Edge, "id") => EDGE_COL_ID,
        (EntityKind::Edge, "start_id") => EDGE_COL_START_ID,
        (EntityKind::Edge, "end_id") => EDGE_COL_END_ID,
        (EntityKind::Edge, "properties") => EDGE_COL_PROPERTIES,
        _ => {
            return Err(ErrorKind::InternalInvariantViolated("unknown entity column").into())
        }
    };
    let ty = if column == "properties" {
        ValueType::Document
    } else {
        ValueType::GraphId
    };
    Ok(Expr::Column(ColumnRef {
        level: 0,
        rte,
        attno,
        name: column.into(),
        ty,
    }))
}

/// Walks the entity list edge by edge and synthesizes the join quals.
fn make_path_join_quals(
    tx: &mut Transformer<'_>,
    entities: &[TransformEntity],
) -> TransformResult<Vec<Expr>> {
    // vertex-only paths have nothing to join
    if entities.len() < 3 {
        return Ok(Vec::new());
    }

    let mut quals = Vec::new();
    for j in (1..entities.len()).step_by(2) {
        let prev_edge = if j >= 3 { Some(&entities[j - 2]) } else { None };
        let prev_node = &entities[j - 1];
        let edge = &entities[j];
        let next_node = entities.get(j + 1).ok_or(
            ErrorKind::InternalInvariantViolated("path pattern must end on a vertex"),
        )?;
        let next_edge = entities.get(j + 2);

        quals.extend(make_join_condition_for_edge(
            tx, prev_edge, prev_node, edge, next_node, next_edge,
        )?);
    }
    Ok(quals)
}

/// Joins one edge to its neighbours:
/// `[prev_edge]-(prev_node)-[edge]-(next_node)-[next_edge]`.
fn make_join_condition_for_edge(
    tx: &mut Transformer<'_>,
    prev_edge: Option<&TransformEntity>,
    prev_node: &TransformEntity,
    edge: &TransformEntity,
    next_node: &TransformEntity,
    next_edge: Option<&TransformEntity>,
) -> TransformResult<Vec<Expr>> {
    // the variable-length call joins through its own arguments
    if edge.kind == EntityKind::VleEdge {
        return Ok(Vec::new());
    }

    let prev_filter = if !prev_node.in_join_tree {
        prev_node.label.clone()
    } else {
        None
    };
    // a following edge will constrain the next vertex itself
    let next_filter = if !next_node.in_join_tree && next_edge.is_none() {
        next_node.label.clone()
    } else {
        None
    };

    let prev_entity = if !prev_node.in_join_tree && prev_edge.is_some() {
        prev_edge.ok_or(ErrorKind::InternalInvariantViolated("missing previous edge"))?
    } else {
        prev_node
    };
    let next_entity = if !next_node.in_join_tree && next_edge.is_some() {
        next_edge.ok_or(ErrorKind::InternalInvariantViolated("missing next edge"))?
    } else {
        next_node
    };

    match edge.dir.unwrap_or(RelDir::Right) {
        RelDir::Right => {
            let prev_qual = make_qual(edge, "start_id")?;
            let next_qual = make_qual(edge, "end_id")?;
            make_directed_edge_join_conditions(
                tx,
                prev_entity,
                next_node,
                &prev_qual,
                &next_qual,
                prev_filter.as_deref(),
                next_filter.as_deref(),
            )
            .map(|q| q.into_vec())
        }
        RelDir::Left => {
            let prev_qual = make_qual(edge, "end_id")?;
            let next_qual = make_qual(edge, "start_id")?;
            make_directed_edge_join_conditions(
                tx,
                prev_entity,
                next_node,
                &prev_qual,
                &next_qual,
                prev_filter.as_deref(),
                next_filter.as_deref(),
            )
            .map(|q| q.into_vec())
        }
        RelDir::None => {
            // either orientation may hold; take the disjunction
            let start = make_qual(edge, "start_id")?;
            let end = make_qual(edge, "end_id")?;

            let first = make_directed_edge_join_conditions(
                tx,
                prev_entity,
                next_entity,
                &start,
                &end,
                prev_filter.as_deref(),
                next_filter.as_deref(),
            )?;
            let second = make_directed_edge_join_conditions(
                tx,
                prev_entity,
                next_entity,
                &end,
                &start,
                prev_filter.as_deref(),
                next_filter.as_deref(),
            )?;

            let or = Expr::Bool {
                op: BoolOp::Or,
                args: vec![
                    Expr::Bool {
                        op: BoolOp::And,
                        args: first.into_vec(),
                    },
                    Expr::Bool {
                        op: BoolOp::And,
                        args: second.into_vec(),
                    },
                ],
            };
            Ok(vec![or])
        }
    }
}

fn make_directed_edge_join_conditions(
    tx: &mut Transformer<'_>,
    prev_entity: &TransformEntity,
    next_entity: &TransformEntity,
    prev_qual: &Expr,
    next_qual: &Expr,
    prev_node_filter: Option<&str>,
    next_node_filter: Option<&str>,
) -> TransformResult<SmallVec<[Expr; 4]>> {
    let mut quals: SmallVec<[Expr; 4]> = SmallVec::new();

    if prev_entity.in_join_tree {
        quals.extend(join_to_entity(prev_entity, prev_qual, JoinSide::Left)?);
    }
    if next_entity.in_join_tree && next_entity.kind != EntityKind::VleEdge {
        quals.extend(join_to_entity(next_entity, next_qual, JoinSide::Right)?);
    }

    if let Some(label) = prev_node_filter {
        if label != DEFAULT_VERTEX_LABEL {
            quals.push(filter_vertices_on_label_id(tx, prev_qual.clone(), label)?);
        }
    }
    if let Some(label) = next_node_filter {
        if label != DEFAULT_VERTEX_LABEL {
            quals.push(filter_vertices_on_label_id(tx, next_qual.clone(), label)?);
        }
    }

    Ok(quals)
}

/// Joins `qual` (an edge endpoint) against a neighbouring entity.
fn join_to_entity(
    entity: &TransformEntity,
    qual: &Expr,
    side: JoinSide,
) -> TransformResult<SmallVec<[Expr; 4]>> {
    let mut quals: SmallVec<[Expr; 4]> = SmallVec::new();

    match entity.kind {
        EntityKind::Vertex => {
            let id = make_qual(entity, "id")?;
            quals.push(Expr::Comparison {
                op: CmpOp::Eq,
                left: Box::new(qual.clone()),
                right: Box::new(id),
            });
        }
        EntityKind::Edge => {
            let edge_quals = make_edge_quals(entity, side)?;
            let eqs: Vec<Expr> = edge_quals
                .into_iter()
                .map(|candidate| Expr::Comparison {
                    op: CmpOp::Eq,
                    left: Box::new(qual.clone()),
                    right: Box::new(candidate),
                })
                .collect();
            if eqs.len() > 1 {
                quals.push(Expr::Bool {
                    op: BoolOp::Or,
                    args: eqs,
                });
            } else {
                quals.extend(eqs);
            }
        }
        EntityKind::VleEdge => {
            let expr = entity.expr.clone().ok_or(
                ErrorKind::InternalInvariantViolated("variable-length entity without expression"),
            )?;
            quals.push(Expr::Func {
                func: BuiltinFunc::VleEndpointMatches,
                args: vec![expr, qual.clone()],
                ty: ValueType::Bool,
            });
        }
    }

    Ok(quals)
}

/// Endpoint candidates when an edge joins to another edge.
fn make_edge_quals(
    edge: &TransformEntity,
    side: JoinSide,
) -> TransformResult<SmallVec<[Expr; 2]>> {
    let (left_col, right_col) = match side {
        JoinSide::Left => ("start_id", "end_id"),
        JoinSide::Right => ("end_id", "start_id"),
    };

    let mut out: SmallVec<[Expr; 2]> = SmallVec::new();
    match edge.dir.unwrap_or(RelDir::Right) {
        RelDir::Left => out.push(make_qual(edge, left_col)?),
        RelDir::Right => out.push(make_qual(edge, right_col)?),
        RelDir::None => {
            out.push(make_qual(edge, left_col)?);
            out.push(make_qual(edge, right_col)?);
        }
    }
    Ok(out)
}

/// `extract_label_id(endpoint) = <label id>` for vertices that never
/// entered the join tree.
fn filter_vertices_on_label_id(
    tx: &Transformer<'_>,
    id_field: Expr,
    label: &str,
) -> TransformResult<Expr> {
    let entry = tx
        .catalog
        .label_by_name(tx.graph.oid, label)
        .ok_or_else(|| ErrorKind::NotFound {
            label: label.to_owned(),
        })?;
    Ok(Expr::Comparison {
        op: CmpOp::Eq,
        left: Box::new(Expr::Func {
            func: BuiltinFunc::ExtractLabelId,
            args: vec![id_field],
            ty: ValueType::Int,
        }),
        right: Box::new(Expr::Literal(BdmValue::Int(entry.id.0 as i64))),
    })
}

/// The single predicate rejecting tuples where two edges share an id.
fn prevent_duplicate_edges(
    _tx: &mut Transformer<'_>,
    entities: &[TransformEntity],
) -> TransformResult<Expr> {
    let mut args = Vec::new();
    for entity in entities {
        match entity.kind {
            EntityKind::Edge => args.push(make_qual(entity, "id")?),
            EntityKind::VleEdge => {
                let expr = entity.expr.clone().ok_or(
                    ErrorKind::InternalInvariantViolated(
                        "variable-length entity without expression",
                    ),
                )?;
                args.push(expr);
            }
            EntityKind::Vertex => {}
        }
    }
    Ok(Expr::Func {
        func: BuiltinFunc::EnforceEdgeUniqueness,
        args,
        ty: ValueType::Bool,
    })
}
