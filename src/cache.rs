//! Graph cache interface.
//!
//! The path evaluator walks vertices, edges, and per-vertex adjacency
//! through this read-only view. Population and invalidation belong to the
//! host; [`InMemoryGraphCache`] backs the tests.

use rustc_hash::FxHashMap;

use crate::bdm::Bdm;
use crate::error::{GraphError, Result};
use crate::model::{Edge, GraphId, Vertex};

/// A cached vertex with its adjacency lists.
///
/// Self-loop edges are kept apart from the out/in lists so an undirected
/// traversal can visit them exactly once.
#[derive(Clone, Debug)]
pub struct VertexEntry {
    /// Entity identifier.
    pub id: GraphId,
    /// Label name.
    pub label: String,
    /// Property document.
    pub properties: Bdm,
    edges_out: Vec<GraphId>,
    edges_in: Vec<GraphId>,
    edges_self: Vec<GraphId>,
}

impl VertexEntry {
    /// Outgoing edges, in insertion order.
    pub fn edges_out(&self) -> &[GraphId] {
        &self.edges_out
    }

    /// Incoming edges, in insertion order.
    pub fn edges_in(&self) -> &[GraphId] {
        &self.edges_in
    }

    /// Self-loop edges, in insertion order.
    pub fn edges_self(&self) -> &[GraphId] {
        &self.edges_self
    }
}

/// A cached edge.
#[derive(Clone, Debug)]
pub struct EdgeEntry {
    /// Entity identifier.
    pub id: GraphId,
    /// Start vertex.
    pub start_id: GraphId,
    /// End vertex.
    pub end_id: GraphId,
    /// Label name.
    pub label: String,
    /// Property document.
    pub properties: Bdm,
}

/// Read-only view of one graph's vertices, edges, and adjacency.
pub trait GraphCache {
    /// Looks up a vertex entry by id.
    fn vertex_entry(&self, id: GraphId) -> Option<&VertexEntry>;

    /// Looks up an edge entry by id.
    fn edge_entry(&self, id: GraphId) -> Option<&EdgeEntry>;

    /// All vertex ids, in a stable order.
    fn vertex_ids(&self) -> Vec<GraphId>;
}

/// In-memory cache used for tests or prototyping.
#[derive(Debug, Default)]
pub struct InMemoryGraphCache {
    vertices: FxHashMap<GraphId, VertexEntry>,
    edges: FxHashMap<GraphId, EdgeEntry>,
    vertex_order: Vec<GraphId>,
}

impl InMemoryGraphCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex.
    pub fn add_vertex(&mut self, vertex: Vertex) {
        let entry = VertexEntry {
            id: vertex.id,
            label: vertex.label,
            properties: vertex.properties,
            edges_out: Vec::new(),
            edges_in: Vec::new(),
            edges_self: Vec::new(),
        };
        if self.vertices.insert(vertex.id, entry).is_none() {
            self.vertex_order.push(vertex.id);
        }
    }

    /// Adds an edge, wiring it into both endpoints' adjacency lists.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if !self.vertices.contains_key(&edge.start_id) || !self.vertices.contains_key(&edge.end_id)
        {
            return Err(GraphError::NotFound("edge endpoint vertex"));
        }

        if edge.start_id == edge.end_id {
            if let Some(v) = self.vertices.get_mut(&edge.start_id) {
                v.edges_self.push(edge.id);
            }
        } else {
            if let Some(v) = self.vertices.get_mut(&edge.start_id) {
                v.edges_out.push(edge.id);
            }
            if let Some(v) = self.vertices.get_mut(&edge.end_id) {
                v.edges_in.push(edge.id);
            }
        }

        self.edges.insert(
            edge.id,
            EdgeEntry {
                id: edge.id,
                start_id: edge.start_id,
                end_id: edge.end_id,
                label: edge.label,
                properties: edge.properties,
            },
        );
        Ok(())
    }
}

impl GraphCache for InMemoryGraphCache {
    fn vertex_entry(&self, id: GraphId) -> Option<&VertexEntry> {
        self.vertices.get(&id)
    }

    fn edge_entry(&self, id: GraphId) -> Option<&EdgeEntry> {
        self.edges.get(&id)
    }

    fn vertex_ids(&self) -> Vec<GraphId> {
        self.vertex_order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabelId;

    fn vertex(entity: u64) -> Vertex {
        Vertex {
            id: GraphId::new(LabelId(1), entity),
            label: "v".into(),
            properties: Bdm::empty_object(),
        }
    }

    fn edge(entity: u64, start: u64, end: u64) -> Edge {
        Edge {
            id: GraphId::new(LabelId(2), entity),
            start_id: GraphId::new(LabelId(1), start),
            end_id: GraphId::new(LabelId(1), end),
            label: "e".into(),
            properties: Bdm::empty_object(),
        }
    }

    #[test]
    fn adjacency_routing() {
        let mut cache = InMemoryGraphCache::new();
        cache.add_vertex(vertex(1));
        cache.add_vertex(vertex(2));
        cache.add_edge(edge(1, 1, 2)).unwrap();
        cache.add_edge(edge(2, 1, 1)).unwrap();

        let v1 = cache.vertex_entry(GraphId::new(LabelId(1), 1)).unwrap();
        assert_eq!(v1.edges_out().len(), 1);
        assert_eq!(v1.edges_self().len(), 1);
        let v2 = cache.vertex_entry(GraphId::new(LabelId(1), 2)).unwrap();
        assert_eq!(v2.edges_in().len(), 1);
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut cache = InMemoryGraphCache::new();
        cache.add_vertex(vertex(1));
        assert!(cache.add_edge(edge(1, 1, 9)).is_err());
    }
}
