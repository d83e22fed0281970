//! Variable-length path evaluation.
//!
//! The set-returning entry point takes the eight positional arguments of
//! the public call — graph name, the two endpoint vertices, the hop
//! bounds, the direction, and the optional label and property filters —
//! and produces a lazy sequence of traversal blobs, one per distinct
//! simple-edge path.

pub mod search;
pub mod uniqueness;

use crate::ast::RelDir;
use crate::bdm::Bdm;
use crate::cache::GraphCache;
use crate::error::Result;
use crate::model::Vertex;

pub use search::{CancelToken, PathSearch};
pub use uniqueness::{enforce_edge_uniqueness, enforce_edge_uniqueness_with, UniquenessArg};

/// Starts a variable-length path search between two vertices.
///
/// Mirrors the public call's positional contract: `lo` defaults to 1 when
/// absent, an absent `hi` is unbounded, and the direction is the wire
/// encoding `-1 = left`, `0 = undirected`, `1 = right`. The graph name is
/// carried for diagnostics; the caller already resolved the cache for it.
#[allow(clippy::too_many_arguments)]
pub fn vle<'g>(
    cache: &'g dyn GraphCache,
    _graph_name: &str,
    start: &Vertex,
    end: &Vertex,
    lo: Option<i64>,
    hi: Option<i64>,
    direction: RelDir,
    label: Option<String>,
    properties: Option<Bdm>,
) -> Result<PathSearch<'g>> {
    PathSearch::new(
        cache,
        start.id,
        end.id,
        lo.map(|v| v.max(0) as u64),
        hi.map(|v| v.max(0) as u64),
        direction,
        label,
        properties,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryGraphCache;
    use crate::model::{Edge, GraphId, LabelId};

    fn vid(entity: u64) -> GraphId {
        GraphId::new(LabelId(1), entity)
    }

    fn eid(entity: u64) -> GraphId {
        GraphId::new(LabelId(2), entity)
    }

    fn graph(edges: &[(u64, u64, u64)]) -> InMemoryGraphCache {
        let mut cache = InMemoryGraphCache::new();
        let mut seen = std::collections::BTreeSet::new();
        for &(_, s, e) in edges {
            seen.insert(s);
            seen.insert(e);
        }
        for v in seen {
            cache.add_vertex(Vertex {
                id: vid(v),
                label: "node".into(),
                properties: Bdm::empty_object(),
            });
        }
        for &(id, s, e) in edges {
            cache
                .add_edge(Edge {
                    id: eid(id),
                    start_id: vid(s),
                    end_id: vid(e),
                    label: "rel".into(),
                    properties: Bdm::empty_object(),
                })
                .unwrap();
        }
        cache
    }

    fn v(entity: u64) -> Vertex {
        Vertex {
            id: vid(entity),
            label: "node".into(),
            properties: Bdm::empty_object(),
        }
    }

    #[test]
    fn zero_lower_bound_emits_nothing() {
        let cache = graph(&[(1, 1, 2)]);
        let mut search = vle(
            &cache,
            "g",
            &v(1),
            &v(2),
            Some(0),
            None,
            RelDir::Right,
            None,
            None,
        )
        .unwrap();
        assert!(search.next().is_none());
    }

    #[test]
    fn missing_endpoint_emits_nothing() {
        let cache = graph(&[(1, 1, 2)]);
        let mut search = vle(
            &cache,
            "g",
            &v(1),
            &v(9),
            None,
            None,
            RelDir::Right,
            None,
            None,
        )
        .unwrap();
        assert!(search.next().is_none());
    }

    #[test]
    fn emitted_paths_respect_bounds_and_endpoints() {
        // 1 -> 2 -> 3 -> 4, plus a shortcut 1 -> 3
        let cache = graph(&[(1, 1, 2), (2, 2, 3), (3, 3, 4), (4, 1, 3)]);
        let search = vle(
            &cache,
            "g",
            &v(1),
            &v(4),
            Some(1),
            Some(3),
            RelDir::Right,
            None,
            None,
        )
        .unwrap();

        let paths: Vec<_> = search.map(|p| p.unwrap()).collect();
        assert_eq!(paths.len(), 2);
        for path in &paths {
            let ids = path.edge_ids().unwrap();
            assert!(!ids.is_empty() && ids.len() <= 3);
            // pairwise distinct edges
            let unique: std::collections::BTreeSet<_> =
                ids.iter().map(|id| id.as_raw()).collect();
            assert_eq!(unique.len(), ids.len());
        }
    }

    #[test]
    fn search_is_deterministic() {
        let cache = graph(&[(1, 1, 2), (2, 2, 3), (3, 1, 3), (4, 3, 4)]);
        let collect = || {
            vle(
                &cache,
                "g",
                &v(1),
                &v(4),
                None,
                None,
                RelDir::Right,
                None,
                None,
            )
            .unwrap()
            .map(|p| p.unwrap().edge_ids().unwrap())
            .collect::<Vec<_>>()
        };
        assert_eq!(collect(), collect());
    }
}
