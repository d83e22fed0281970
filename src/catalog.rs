//! Label catalog interface.
//!
//! The transformer resolves label names to identifiers and relation names
//! through this trait; `CREATE`/`MERGE` also create missing labels under
//! the graph's namespace. The catalog itself (persistence, invalidation)
//! lives with the host; [`InMemoryCatalog`] is the test double.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::model::LabelId;

/// Label name every vertex label descends from.
pub const DEFAULT_VERTEX_LABEL: &str = "_vertex";

/// Label name every edge label descends from.
pub const DEFAULT_EDGE_LABEL: &str = "_edge";

/// Whether a label names vertices or edges.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LabelKind {
    /// Vertex label.
    Vertex,
    /// Edge label.
    Edge,
}

impl LabelKind {
    /// Lowercase kind name for error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            LabelKind::Vertex => "vertex",
            LabelKind::Edge => "edge",
        }
    }

    /// The default label this kind's labels inherit from.
    pub fn default_label(self) -> &'static str {
        match self {
            LabelKind::Vertex => DEFAULT_VERTEX_LABEL,
            LabelKind::Edge => DEFAULT_EDGE_LABEL,
        }
    }
}

/// One catalog record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabelEntry {
    /// Catalog identifier of the label.
    pub id: LabelId,
    /// Vertex or edge.
    pub kind: LabelKind,
    /// Name of the relation backing the label.
    pub relation: String,
}

/// A graph reference: the name the query used and the catalog oid.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GraphRef {
    /// Graph name as written in the query.
    pub name: String,
    /// Catalog identifier of the graph.
    pub oid: u32,
}

/// Name-to-identifier resolution for labels, plus label creation for the
/// mutating clauses.
pub trait LabelCatalog {
    /// Looks up a label by name within one graph.
    fn label_by_name(&self, graph: u32, name: &str) -> Option<LabelEntry>;

    /// Relation name backing a label id.
    fn label_relation_name(&self, graph: u32, label: LabelId) -> Result<String>;

    /// Returns the label id, creating the label under `parent` when it does
    /// not exist yet.
    fn ensure_label(&mut self, graph: u32, name: &str, kind: LabelKind, parent: &str)
        -> Result<LabelId>;
}

/// Simple in-memory catalog used for tests or prototyping.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    labels: HashMap<(u32, String), LabelEntry>,
    by_id: HashMap<(u32, LabelId), String>,
    next_id: u32,
}

impl InMemoryCatalog {
    /// Creates a catalog with the default vertex/edge labels of `graph`
    /// pre-registered.
    pub fn new(graph: u32) -> Self {
        let mut catalog = InMemoryCatalog {
            labels: HashMap::new(),
            by_id: HashMap::new(),
            next_id: 1,
        };
        catalog.insert(graph, DEFAULT_VERTEX_LABEL, LabelKind::Vertex);
        catalog.insert(graph, DEFAULT_EDGE_LABEL, LabelKind::Edge);
        catalog
    }

    fn insert(&mut self, graph: u32, name: &str, kind: LabelKind) -> LabelId {
        let id = LabelId(self.next_id);
        self.next_id += 1;
        self.labels.insert(
            (graph, name.to_owned()),
            LabelEntry {
                id,
                kind,
                relation: name.to_owned(),
            },
        );
        self.by_id.insert((graph, id), name.to_owned());
        id
    }

    /// Registers a vertex label.
    pub fn with_vertex_label(mut self, graph: u32, name: &str) -> Self {
        self.insert(graph, name, LabelKind::Vertex);
        self
    }

    /// Registers an edge label.
    pub fn with_edge_label(mut self, graph: u32, name: &str) -> Self {
        self.insert(graph, name, LabelKind::Edge);
        self
    }
}

impl LabelCatalog for InMemoryCatalog {
    fn label_by_name(&self, graph: u32, name: &str) -> Option<LabelEntry> {
        self.labels.get(&(graph, name.to_owned())).cloned()
    }

    fn label_relation_name(&self, graph: u32, label: LabelId) -> Result<String> {
        self.by_id
            .get(&(graph, label))
            .cloned()
            .ok_or(GraphError::NotFound("label"))
    }

    fn ensure_label(
        &mut self,
        graph: u32,
        name: &str,
        kind: LabelKind,
        _parent: &str,
    ) -> Result<LabelId> {
        if let Some(entry) = self.label_by_name(graph, name) {
            if entry.kind != kind {
                return Err(GraphError::LabelKindMismatch {
                    label: name.to_owned(),
                    actual: entry.kind.as_str(),
                    expected: kind.as_str(),
                });
            }
            return Ok(entry.id);
        }
        Ok(self.insert(graph, name, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_label_is_idempotent() {
        let mut catalog = InMemoryCatalog::new(1);
        let a = catalog
            .ensure_label(1, "person", LabelKind::Vertex, DEFAULT_VERTEX_LABEL)
            .unwrap();
        let b = catalog
            .ensure_label(1, "person", LabelKind::Vertex, DEFAULT_VERTEX_LABEL)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ensure_label_rejects_kind_conflicts() {
        let mut catalog = InMemoryCatalog::new(1).with_vertex_label(1, "person");
        let err = catalog
            .ensure_label(1, "person", LabelKind::Edge, DEFAULT_EDGE_LABEL)
            .unwrap_err();
        assert!(matches!(err, GraphError::LabelKindMismatch { .. }));
    }
}
