//! Variable-length path evaluation scenarios.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

use penumbra::ast::RelDir;
use penumbra::bdm::{Bdm, BdmValue};
use penumbra::cache::InMemoryGraphCache;
use penumbra::model::{Edge, GraphId, LabelId, PathElement, Vertex};
use penumbra::vle::{enforce_edge_uniqueness, vle, UniquenessArg};

const VERTEX_LABEL: LabelId = LabelId(1);
const EDGE_LABEL: LabelId = LabelId(2);

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("penumbra::vle=trace"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn vid(entity: u64) -> GraphId {
    GraphId::new(VERTEX_LABEL, entity)
}

fn eid(entity: u64) -> GraphId {
    GraphId::new(EDGE_LABEL, entity)
}

fn vertex(entity: u64) -> Vertex {
    Vertex {
        id: vid(entity),
        label: "node".into(),
        properties: Bdm::empty_object(),
    }
}

fn edge(entity: u64, start: u64, end: u64) -> Edge {
    Edge {
        id: eid(entity),
        start_id: vid(start),
        end_id: vid(end),
        label: "rel".into(),
        properties: Bdm::empty_object(),
    }
}

fn edge_ids(path: &penumbra::VariableEdge) -> Vec<u64> {
    path.edge_ids()
        .unwrap()
        .into_iter()
        .map(|id| id.entity_id())
        .collect()
}

#[test]
fn two_hop_path() {
    init_tracing();
    // V1 -E1-> V2 -E2-> V3
    let mut cache = InMemoryGraphCache::new();
    for v in 1..=3 {
        cache.add_vertex(vertex(v));
    }
    cache.add_edge(edge(1, 1, 2)).unwrap();
    cache.add_edge(edge(2, 2, 3)).unwrap();

    let paths: Vec<_> = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(3),
        Some(2),
        Some(2),
        RelDir::Right,
        None,
        None,
    )
    .unwrap()
    .map(|p| p.unwrap())
    .collect();

    assert_eq!(paths.len(), 1);
    assert_eq!(edge_ids(&paths[0]), vec![1, 2]);

    // element sequence: start vertex, first edge, interior vertex, last edge
    let elements = paths[0].elements().unwrap();
    assert_eq!(elements.len(), 4);
    match (&elements[0], &elements[1], &elements[2], &elements[3]) {
        (
            PathElement::Vertex(v0),
            PathElement::Edge(e1),
            PathElement::Vertex(v1),
            PathElement::Edge(e2),
        ) => {
            assert_eq!(v0.id, vid(1));
            assert_eq!(e1.id, eid(1));
            assert_eq!(v1.id, vid(2));
            assert_eq!(e2.id, eid(2));
        }
        other => panic!("unexpected traversal shape {other:?}"),
    }
}

#[test]
fn diamond_emits_both_paths_in_dfs_order() {
    init_tracing();
    // V1 -A-> V2 -C-> V4 and V1 -B-> V3 -D-> V4
    let mut cache = InMemoryGraphCache::new();
    for v in 1..=4 {
        cache.add_vertex(vertex(v));
    }
    cache.add_edge(edge(1, 1, 2)).unwrap(); // A
    cache.add_edge(edge(2, 2, 4)).unwrap(); // C
    cache.add_edge(edge(3, 1, 3)).unwrap(); // B
    cache.add_edge(edge(4, 3, 4)).unwrap(); // D

    let paths: Vec<_> = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(4),
        Some(2),
        Some(2),
        RelDir::Right,
        None,
        None,
    )
    .unwrap()
    .map(|p| p.unwrap())
    .collect();

    assert_eq!(paths.len(), 2);
    // depth-first over a stack explores the last-loaded branch first
    assert_eq!(edge_ids(&paths[0]), vec![3, 4]);
    assert_eq!(edge_ids(&paths[1]), vec![1, 2]);
}

#[test]
fn self_loop_is_emitted_and_rejected_by_uniqueness() {
    init_tracing();
    let mut cache = InMemoryGraphCache::new();
    cache.add_vertex(vertex(1));
    cache.add_edge(edge(1, 1, 1)).unwrap();

    let paths: Vec<_> = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(1),
        Some(1),
        Some(1),
        RelDir::None,
        None,
        None,
    )
    .unwrap()
    .map(|p| p.unwrap())
    .collect();

    assert_eq!(paths.len(), 1);
    assert_eq!(edge_ids(&paths[0]), vec![1]);

    // binding the same edge twice in one pattern is rejected post hoc
    assert!(!enforce_edge_uniqueness(&[
        UniquenessArg::EdgeId(eid(1)),
        UniquenessArg::EdgeId(eid(1)),
    ])
    .unwrap());
    assert!(enforce_edge_uniqueness(&[
        UniquenessArg::EdgeId(eid(1)),
        UniquenessArg::EdgeId(eid(2)),
    ])
    .unwrap());
    assert!(!enforce_edge_uniqueness(&[
        UniquenessArg::Traversal(&paths[0]),
        UniquenessArg::EdgeId(eid(1)),
    ])
    .unwrap());
}

#[test]
fn property_filter_gates_edges() {
    init_tracing();
    let props = Bdm::build(&BdmValue::Object(vec![
        ("weight".into(), BdmValue::Int(3)),
        ("kind".into(), BdmValue::String("x".into())),
    ]))
    .unwrap();

    let mut cache = InMemoryGraphCache::new();
    cache.add_vertex(vertex(1));
    cache.add_vertex(vertex(2));
    cache
        .add_edge(Edge {
            id: eid(1),
            start_id: vid(1),
            end_id: vid(2),
            label: "rel".into(),
            properties: props,
        })
        .unwrap();

    let accept =
        Bdm::build(&BdmValue::Object(vec![("kind".into(), BdmValue::String("x".into()))])).unwrap();
    let reject =
        Bdm::build(&BdmValue::Object(vec![("kind".into(), BdmValue::String("y".into()))])).unwrap();

    let accepted = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(2),
        None,
        None,
        RelDir::Right,
        None,
        Some(accept),
    )
    .unwrap()
    .count();
    assert_eq!(accepted, 1);

    let rejected = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(2),
        None,
        None,
        RelDir::Right,
        None,
        Some(reject),
    )
    .unwrap()
    .count();
    assert_eq!(rejected, 0);
}

#[test]
fn label_filter_gates_edges() {
    init_tracing();
    let mut cache = InMemoryGraphCache::new();
    cache.add_vertex(vertex(1));
    cache.add_vertex(vertex(2));
    cache.add_edge(edge(1, 1, 2)).unwrap();

    let matched = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(2),
        None,
        None,
        RelDir::Right,
        Some("rel".into()),
        None,
    )
    .unwrap()
    .count();
    assert_eq!(matched, 1);

    let unmatched = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(2),
        None,
        None,
        RelDir::Right,
        Some("other".into()),
        None,
    )
    .unwrap()
    .count();
    assert_eq!(unmatched, 0);
}

#[test]
fn undirected_traversal_walks_against_edges() {
    init_tracing();
    // V1 <-E1- V2: only an undirected search can go 1 -> 2
    let mut cache = InMemoryGraphCache::new();
    cache.add_vertex(vertex(1));
    cache.add_vertex(vertex(2));
    cache.add_edge(edge(1, 2, 1)).unwrap();

    let directed = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(2),
        None,
        None,
        RelDir::Right,
        None,
        None,
    )
    .unwrap()
    .count();
    assert_eq!(directed, 0);

    let undirected: Vec<_> = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(2),
        None,
        None,
        RelDir::None,
        None,
        None,
    )
    .unwrap()
    .map(|p| p.unwrap())
    .collect();
    assert_eq!(undirected.len(), 1);
    assert_eq!(edge_ids(&undirected[0]), vec![1]);
}

#[test]
fn hop_bounds_prune_long_paths() {
    init_tracing();
    // chain of five vertices
    let mut cache = InMemoryGraphCache::new();
    for v in 1..=5 {
        cache.add_vertex(vertex(v));
    }
    for e in 1..=4 {
        cache.add_edge(edge(e, e, e + 1)).unwrap();
    }

    let within = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(5),
        Some(4),
        Some(4),
        RelDir::Right,
        None,
        None,
    )
    .unwrap()
    .count();
    assert_eq!(within, 1);

    let too_short = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(5),
        Some(1),
        Some(3),
        RelDir::Right,
        None,
        None,
    )
    .unwrap()
    .count();
    assert_eq!(too_short, 0);
}

#[test]
fn search_terminates_on_cycles() {
    init_tracing();
    // triangle with both orientations available
    let mut cache = InMemoryGraphCache::new();
    for v in 1..=3 {
        cache.add_vertex(vertex(v));
    }
    cache.add_edge(edge(1, 1, 2)).unwrap();
    cache.add_edge(edge(2, 2, 3)).unwrap();
    cache.add_edge(edge(3, 3, 1)).unwrap();

    let paths: Vec<_> = vle(
        &cache,
        "g",
        &vertex(1),
        &vertex(3),
        None,
        None,
        RelDir::None,
        None,
        None,
    )
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap();

    // finite graph, unique-edge DFS: the enumeration is finite and every
    // path has pairwise distinct edges
    assert!(!paths.is_empty());
    for path in &paths {
        let ids = edge_ids(path);
        let unique: std::collections::BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
