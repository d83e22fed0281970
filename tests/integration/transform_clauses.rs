//! End-to-end clause transformation scenarios.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use penumbra::ast::{
    Clause, CreateClause, DeleteClause, Expr, HopRange, MatchClause, MergeClause, NodePattern,
    Path, PathElementAst, RelDir, RelPattern, ReturnClause, ReturnItem, SetClause, SetItem,
    SetOp, SortItem, UnwindClause,
};
use penumbra::bdm::BdmValue;
use penumbra::catalog::{GraphRef, InMemoryCatalog};
use penumbra::rel::{self, BuiltinFunc, FromItem, JoinKind, RteKind};
use penumbra::transform::Transformer;

const GRAPH: u32 = 1;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("penumbra::transform=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(GRAPH)
        .with_vertex_label(GRAPH, "person")
        .with_vertex_label(GRAPH, "city")
        .with_edge_label(GRAPH, "knows")
}

fn graph_ref() -> GraphRef {
    GraphRef {
        name: "g".into(),
        oid: GRAPH,
    }
}

fn transform(clauses: &[Clause]) -> Result<rel::Query, penumbra::TransformError> {
    init_tracing();
    let mut catalog = catalog();
    Transformer::new(&mut catalog, graph_ref()).transform_statement(clauses)
}

fn node(name: Option<&str>, label: Option<&str>) -> PathElementAst {
    PathElementAst::Node(NodePattern {
        name: name.map(Into::into),
        label: label.map(Into::into),
        props: None,
        location: None,
    })
}

fn edge(name: Option<&str>, dir: RelDir) -> PathElementAst {
    PathElementAst::Relationship(RelPattern {
        name: name.map(Into::into),
        label: None,
        props: None,
        dir,
        varlen: None,
        location: None,
    })
}

fn path(elements: Vec<PathElementAst>) -> Path {
    Path {
        var_name: None,
        elements,
        location: None,
    }
}

fn match_clause(pattern: Vec<Path>) -> Clause {
    Clause::Match(MatchClause {
        optional: false,
        pattern,
        where_clause: None,
        location: None,
    })
}

fn return_vars(names: &[&str]) -> Clause {
    Clause::Return(ReturnClause::plain(
        names
            .iter()
            .map(|name| ReturnItem {
                expr: Expr::Variable((*name).into()),
                alias: Some((*name).into()),
                location: None,
            })
            .collect(),
    ))
}

fn return_int(value: i64, alias: &str) -> ReturnClause {
    ReturnClause::plain(vec![ReturnItem {
        expr: Expr::Literal(BdmValue::Int(value)),
        alias: Some(alias.into()),
        location: None,
    }])
}

fn union(left: ReturnClause, right: ReturnClause, all: bool) -> Clause {
    Clause::Return(ReturnClause {
        distinct: false,
        items: vec![],
        order_by: vec![],
        skip: None,
        limit: None,
        op: SetOp::Union,
        all,
        larg: Some(Box::new(left)),
        rarg: Some(Box::new(right)),
        location: None,
    })
}

/// Walks an expression tree looking for a builtin call.
fn find_func<'a>(expr: &'a rel::Expr, func: BuiltinFunc) -> Option<&'a rel::Expr> {
    match expr {
        rel::Expr::Func { func: f, args, .. } => {
            if *f == func {
                return Some(expr);
            }
            args.iter().find_map(|a| find_func(a, func))
        }
        rel::Expr::Bool { args, .. }
        | rel::Expr::Call { args, .. }
        | rel::Expr::Aggregate { args, .. } => args.iter().find_map(|a| find_func(a, func)),
        rel::Expr::Comparison { left, right, .. } => {
            find_func(left, func).or_else(|| find_func(right, func))
        }
        rel::Expr::Coerce { input, .. } => find_func(input, func),
        _ => None,
    }
}

#[test]
fn delete_cannot_open_a_statement() {
    let err = transform(&[Clause::Delete(DeleteClause {
        exprs: vec![Expr::Variable("n".into())],
        detach: false,
        location: Some(7),
    })])
    .unwrap_err();
    assert_eq!(err.code(), "FirstClauseIllegal");
    assert_eq!(err.location, Some(7));
}

#[test]
fn set_and_remove_cannot_open_a_statement() {
    for is_remove in [false, true] {
        let err = transform(&[Clause::Set(SetClause {
            items: vec![SetItem {
                variable: "n".into(),
                path: vec!["age".into()],
                value: (!is_remove).then(|| Expr::Literal(BdmValue::Int(1))),
                is_add: false,
                location: None,
            }],
            is_remove,
            location: None,
        })])
        .unwrap_err();
        assert_eq!(err.code(), "FirstClauseIllegal");
    }
}

#[test]
fn two_edge_path_enforces_edge_uniqueness() {
    let query = transform(&[match_clause(vec![path(vec![
        node(Some("a"), None),
        edge(Some("e"), RelDir::Right),
        node(Some("b"), None),
        edge(Some("f"), RelDir::Right),
        node(Some("c"), None),
    ])])])
    .unwrap();

    let qual = query.jointree.qual.as_ref().expect("match qual");
    let uniq = find_func(qual, BuiltinFunc::EnforceEdgeUniqueness).expect("uniqueness predicate");
    match uniq {
        rel::Expr::Func { args, .. } => assert_eq!(args.len(), 2),
        other => panic!("unexpected shape {other:?}"),
    }
}

#[test]
fn single_edge_path_has_no_uniqueness_predicate() {
    let query = transform(&[match_clause(vec![path(vec![
        node(Some("a"), None),
        edge(Some("e"), RelDir::Right),
        node(Some("b"), None),
    ])])])
    .unwrap();

    let qual = query.jointree.qual.as_ref().expect("match qual");
    assert!(find_func(qual, BuiltinFunc::EnforceEdgeUniqueness).is_none());
}

#[test]
fn optional_match_builds_one_lateral_left_join() {
    let query = transform(&[
        match_clause(vec![path(vec![node(Some("a"), Some("person"))])]),
        Clause::Match(MatchClause {
            optional: true,
            pattern: vec![path(vec![
                node(Some("a"), None),
                edge(Some("e"), RelDir::Right),
                node(Some("b"), None),
            ])],
            where_clause: None,
            location: None,
        }),
    ])
    .unwrap();

    assert_eq!(query.jointree.items.len(), 1);
    let FromItem::Join(join) = &query.jointree.items[0] else {
        panic!("expected a join item");
    };
    assert_eq!(join.kind, JoinKind::LateralLeft);

    // merged columns: left's first, right additions after, no duplicates
    let join_cols = &query.range_table[join.rte].columns;
    let names: Vec<&str> = join_cols.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names[0], "a");
    assert!(names.contains(&"e"));
    assert!(names.contains(&"b"));
    assert_eq!(
        names.iter().filter(|n| **n == "a").count(),
        1,
        "left precedence must deduplicate the shared variable"
    );

    // both sides rank as sub-queries, the right one lateral
    let left_is_lateral = matches!(
        &query.range_table[0].kind,
        RteKind::Subquery { lateral, .. } if !*lateral
    );
    let right_is_lateral = matches!(
        &query.range_table[1].kind,
        RteKind::Subquery { lateral, .. } if *lateral
    );
    assert!(left_is_lateral && right_is_lateral);
}

#[test]
fn union_merges_column_types() {
    let query = transform(&[union(return_int(1, "n"), return_int(2, "n"), false)]).unwrap();
    assert_eq!(query.target_list.len(), 1);
    assert_eq!(query.target_list[0].name, "n");
    let setop = query.set_operations.expect("set operation tree");
    assert_eq!(setop.columns.len(), 1);
    assert!(setop.columns[0].dedup);
    assert!(!setop.columns[0].hashable);
}

#[test]
fn union_all_keeps_duplicates() {
    let query = transform(&[union(return_int(1, "n"), return_int(2, "n"), true)]).unwrap();
    let setop = query.set_operations.expect("set operation tree");
    assert!(!setop.columns[0].dedup);
}

#[test]
fn union_rejects_mismatched_column_counts() {
    let left = return_int(1, "n");
    let right = ReturnClause::plain(vec![
        ReturnItem {
            expr: Expr::Literal(BdmValue::Int(2)),
            alias: Some("n".into()),
            location: None,
        },
        ReturnItem {
            expr: Expr::Literal(BdmValue::Int(3)),
            alias: Some("m".into()),
            location: None,
        },
    ]);
    let err = transform(&[union(left, right, false)]).unwrap_err();
    assert_eq!(err.code(), "UnionColumnMismatch");
}

#[test]
fn union_order_by_must_name_an_output_column() {
    let mut top = match union(return_int(1, "n"), return_int(2, "n"), false) {
        Clause::Return(rc) => rc,
        _ => unreachable!(),
    };
    top.order_by = vec![SortItem {
        expr: Expr::Literal(BdmValue::Int(42)),
        descending: false,
        location: None,
    }];
    let err = transform(&[Clause::Return(top)]).unwrap_err();
    assert_eq!(err.code(), "InvalidUnionOrderBy");
}

#[test]
fn unwind_rejects_shadowing_alias() {
    let err = transform(&[
        match_clause(vec![path(vec![node(Some("xs"), None)])]),
        Clause::Unwind(UnwindClause {
            name: "xs".into(),
            value: Expr::Variable("xs".into()),
            location: None,
        }),
    ])
    .unwrap_err();
    assert_eq!(err.code(), "DuplicateAlias");
}

#[test]
fn create_requires_directed_edges() {
    let err = transform(&[Clause::Create(CreateClause {
        pattern: vec![path(vec![
            node(Some("a"), None),
            edge(None, RelDir::None),
            node(Some("b"), None),
        ])],
        location: None,
    })])
    .unwrap_err();
    assert_eq!(err.code(), "DirectedRelationshipRequired");
}

#[test]
fn create_requires_edge_labels() {
    let err = transform(&[Clause::Create(CreateClause {
        pattern: vec![path(vec![
            node(Some("a"), None),
            edge(None, RelDir::Right),
            node(Some("b"), None),
        ])],
        location: None,
    })])
    .unwrap_err();
    assert_eq!(err.code(), "EdgeLabelRequired");
}

#[test]
fn create_rejects_parameter_properties() {
    let err = transform(&[Clause::Create(CreateClause {
        pattern: vec![path(vec![PathElementAst::Node(NodePattern {
            name: Some("a".into()),
            label: None,
            props: Some(Expr::Parameter("props".into())),
            location: None,
        })])],
        location: None,
    })])
    .unwrap_err();
    assert_eq!(err.code(), "ParameterPropertiesUnsupported");
}

#[test]
fn create_emits_marker_and_passthrough() {
    let query = transform(&[
        match_clause(vec![path(vec![node(Some("a"), Some("person"))])]),
        Clause::Create(CreateClause {
            pattern: vec![path(vec![
                node(Some("a"), None),
                PathElementAst::Relationship(RelPattern {
                    name: None,
                    label: Some("knows".into()),
                    props: None,
                    dir: RelDir::Right,
                    varlen: None,
                    location: None,
                }),
                node(Some("b"), None),
            ])],
            location: None,
        }),
    ])
    .unwrap();

    let marker = query
        .target_list
        .iter()
        .find(|te| te.name == "_create_clause")
        .expect("create marker column");
    assert!(find_func(&marker.expr, BuiltinFunc::CreateClauseMarker).is_some());
    // the previously bound variable is still an output
    assert!(query.find_target("a").is_some());
    // the newly created vertex got a placeholder slot
    assert!(query.find_target("b").is_some());
}

#[test]
fn set_requires_single_segment_property_paths() {
    let err = transform(&[
        match_clause(vec![path(vec![node(Some("n"), None)])]),
        Clause::Set(SetClause {
            items: vec![SetItem {
                variable: "n".into(),
                path: vec!["a".into(), "b".into()],
                value: Some(Expr::Literal(BdmValue::Int(1))),
                is_add: false,
                location: None,
            }],
            is_remove: false,
            location: None,
        }),
    ])
    .unwrap_err();
    assert_eq!(err.code(), "NestedPropertyUpdateUnsupported");
}

#[test]
fn set_rejects_map_addition() {
    let err = transform(&[
        match_clause(vec![path(vec![node(Some("n"), None)])]),
        Clause::Set(SetClause {
            items: vec![SetItem {
                variable: "n".into(),
                path: vec!["a".into()],
                value: Some(Expr::Literal(BdmValue::Int(1))),
                is_add: true,
                location: None,
            }],
            is_remove: false,
            location: None,
        }),
    ])
    .unwrap_err();
    assert_eq!(err.code(), "AddPropertiesFromMapUnsupported");
}

#[test]
fn set_rejects_unbound_variables() {
    let err = transform(&[
        match_clause(vec![path(vec![node(Some("n"), None)])]),
        Clause::Set(SetClause {
            items: vec![SetItem {
                variable: "missing".into(),
                path: vec!["a".into()],
                value: Some(Expr::Literal(BdmValue::Int(1))),
                is_add: false,
                location: None,
            }],
            is_remove: false,
            location: None,
        }),
    ])
    .unwrap_err();
    assert_eq!(err.code(), "UndefinedVariable");
}

#[test]
fn merge_requires_edge_labels() {
    let err = transform(&[Clause::Merge(MergeClause {
        path: path(vec![
            node(Some("a"), None),
            edge(None, RelDir::Right),
            node(Some("b"), None),
        ]),
        location: None,
    })])
    .unwrap_err();
    assert_eq!(err.code(), "EdgeLabelRequired");
}

#[test]
fn merge_with_previous_clause_builds_lateral_join() {
    let query = transform(&[
        match_clause(vec![path(vec![node(Some("a"), Some("person"))])]),
        Clause::Merge(MergeClause {
            path: path(vec![
                node(Some("a"), None),
                PathElementAst::Relationship(RelPattern {
                    name: None,
                    label: Some("knows".into()),
                    props: None,
                    dir: RelDir::Right,
                    varlen: None,
                    location: None,
                }),
                node(Some("b"), None),
            ]),
            location: None,
        }),
    ])
    .unwrap();

    assert_eq!(query.jointree.items.len(), 1);
    assert!(matches!(&query.jointree.items[0], FromItem::Join(j) if j.kind == JoinKind::LateralLeft));
    let marker = query
        .target_list
        .iter()
        .find(|te| te.name == "_merge_clause")
        .expect("merge marker column");
    assert!(find_func(&marker.expr, BuiltinFunc::MergeClauseMarker).is_some());
}

#[test]
fn match_with_unknown_label_fails() {
    let err = transform(&[match_clause(vec![path(vec![node(
        Some("a"),
        Some("nosuch"),
    )])])])
    .unwrap_err();
    assert_eq!(err.code(), "NotFound");
}

#[test]
fn match_with_edge_label_on_vertex_fails() {
    let err = transform(&[match_clause(vec![path(vec![node(
        Some("a"),
        Some("knows"),
    )])])])
    .unwrap_err();
    assert_eq!(err.code(), "LabelKindMismatch");
}

#[test]
fn variable_length_edge_ranges_a_lateral_function() {
    let query = transform(&[match_clause(vec![path(vec![
        node(Some("a"), None),
        PathElementAst::Relationship(RelPattern {
            name: Some("p".into()),
            label: None,
            props: None,
            dir: RelDir::Right,
            varlen: Some(HopRange {
                lo: Some(Expr::Literal(BdmValue::Int(1))),
                hi: Some(Expr::Literal(BdmValue::Int(3))),
            }),
            location: None,
        }),
        node(Some("b"), None),
    ])])])
    .unwrap();

    let function_rte = query
        .range_table
        .iter()
        .find(|rte| matches!(rte.kind, RteKind::Function { .. }))
        .expect("lateral function entry");
    assert_eq!(function_rte.columns.len(), 1);
    assert_eq!(function_rte.columns[0].name, "edges");
    match &function_rte.kind {
        RteKind::Function { call, lateral } => {
            assert!(*lateral);
            assert!(find_func(call, BuiltinFunc::Vle).is_some());
        }
        _ => unreachable!(),
    }
    // the traversal column is projected under the edge's variable name
    assert!(query.find_target("p").is_some());
}

#[test]
fn return_projects_previous_clause_columns() {
    let query = transform(&[
        match_clause(vec![path(vec![node(Some("a"), Some("person"))])]),
        return_vars(&["a"]),
    ])
    .unwrap();
    assert_eq!(query.target_list.len(), 1);
    assert_eq!(query.target_list[0].name, "a");
}

#[test]
fn return_aggregate_induces_group_keys() {
    let query = transform(&[
        match_clause(vec![path(vec![node(Some("a"), Some("person"))])]),
        Clause::Return(ReturnClause::plain(vec![
            ReturnItem {
                expr: Expr::Variable("a".into()),
                alias: Some("a".into()),
                location: None,
            },
            ReturnItem {
                expr: Expr::FuncCall {
                    name: "count".into(),
                    args: vec![Expr::Variable("a".into())],
                },
                alias: Some("c".into()),
                location: None,
            },
        ])),
    ])
    .unwrap();

    assert!(query.has_aggs);
    assert_eq!(query.group_clause, vec![1]);
}
