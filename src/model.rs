//! Data models for graph entities.
//!
//! This module defines the identifier scheme and the typed wrappers used to
//! move vertices, edges, and whole traversals between the transformer, the
//! evaluator, and the host executor.
//!
//! # Key Types
//!
//! - [`GraphId`] - 64-bit entity identifier carrying its label in the upper bits
//! - [`Vertex`] / [`Edge`] - decoded graph entities with document properties
//! - [`VariableEdge`] - the binary form of one concrete variable-length path
//! - [`PathContainer`] - the raw graphid array a path is materialized from

use serde::{Deserialize, Serialize};

use crate::bdm::{Bdm, BdmValue};
use crate::error::{GraphError, Result};

/// Identifier for a label within one graph's catalog.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u32);

/// Number of high bits of a [`GraphId`] reserved for the label identifier.
pub const LABEL_ID_BITS: u32 = 16;

/// Number of low bits of a [`GraphId`] holding the per-label entity sequence.
pub const ENTITY_ID_BITS: u32 = 48;

const ENTITY_ID_MASK: u64 = (1 << ENTITY_ID_BITS) - 1;

/// 64-bit graph entity identifier.
///
/// The upper [`LABEL_ID_BITS`] bits carry the label identity, so extracting
/// the label of an id is a shift rather than a catalog lookup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct GraphId(u64);

/// Special value indicating no entity.
pub const NULL_GRAPH_ID: GraphId = GraphId(0);

impl GraphId {
    /// Composes an id from a label id and an entity sequence number.
    pub fn new(label: LabelId, entity: u64) -> Self {
        GraphId(((label.0 as u64) << ENTITY_ID_BITS) | (entity & ENTITY_ID_MASK))
    }

    /// Reinterprets a raw 64-bit value as a graph id.
    pub fn from_raw(raw: u64) -> Self {
        GraphId(raw)
    }

    /// Raw 64-bit representation.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Extracts the label identity from the upper bits.
    pub fn label_id(self) -> LabelId {
        LabelId((self.0 >> ENTITY_ID_BITS) as u32)
    }

    /// Per-label entity sequence number from the lower bits.
    pub fn entity_id(self) -> u64 {
        self.0 & ENTITY_ID_MASK
    }
}

impl std::fmt::Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.label_id().0, self.entity_id())
    }
}

/// A decoded vertex: identifier, label name, and a property document.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    /// Unique identifier for this vertex.
    pub id: GraphId,
    /// Label name resolved through the catalog.
    pub label: String,
    /// Property document.
    pub properties: Bdm,
}

impl Vertex {
    /// Serializes the vertex into its document representation.
    pub fn to_document(&self) -> Result<Bdm> {
        Bdm::build(&BdmValue::vertex(
            self.id,
            self.label.clone(),
            self.properties.root_value()?,
        ))
    }
}

/// A decoded edge: identifier, endpoint identifiers, label name, properties.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    /// Unique identifier for this edge.
    pub id: GraphId,
    /// Identifier of the vertex the edge starts at.
    pub start_id: GraphId,
    /// Identifier of the vertex the edge ends at.
    pub end_id: GraphId,
    /// Label name resolved through the catalog.
    pub label: String,
    /// Property document.
    pub properties: Bdm,
}

impl Edge {
    /// Serializes the edge into its document representation.
    pub fn to_document(&self) -> Result<Bdm> {
        Bdm::build(&BdmValue::edge(
            self.id,
            self.start_id,
            self.end_id,
            self.label.clone(),
            self.properties.root_value()?,
        ))
    }
}

/// One element of a traversal: a vertex or an edge document.
#[derive(Clone, Debug, PartialEq)]
pub enum PathElement {
    /// A vertex element.
    Vertex(Vertex),
    /// An edge element.
    Edge(Edge),
}

/// The binary representation of one concrete variable-length path.
///
/// Layout: a 4-byte element count followed by the serialized documents of
/// the elements in order `V0, E1, V1, E2, …, En` — the start vertex first,
/// interior vertices between edges, and the final edge last. The end vertex
/// is the search's known endpoint and is not stored, so a traversal always
/// ends on an edge and edge documents sit at odd (0-based) positions.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableEdge {
    bytes: Vec<u8>,
}

impl VariableEdge {
    /// Builds a traversal from an alternating vertex/edge element sequence.
    ///
    /// Fails unless elements alternate starting with a vertex and the final
    /// element is an edge.
    pub fn build(elements: &[PathElement]) -> Result<Self> {
        if elements.is_empty() || elements.len() % 2 != 0 {
            return Err(GraphError::InternalInvariantViolated(
                "traversals must alternate vertex/edge and end with an edge",
            ));
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(elements.len() as u32).to_le_bytes());

        for (i, element) in elements.iter().enumerate() {
            let doc = match (i % 2 == 0, element) {
                (true, PathElement::Vertex(v)) => v.to_document()?,
                (false, PathElement::Edge(e)) => e.to_document()?,
                _ => {
                    return Err(GraphError::InternalInvariantViolated(
                        "traversal element out of alternation order",
                    ))
                }
            };
            bytes.extend_from_slice(doc.as_bytes());
        }

        Ok(VariableEdge { bytes })
    }

    /// Reconstructs a traversal from its serialized form.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(GraphError::CorruptDocument("traversal header truncated"));
        }
        let ve = VariableEdge { bytes };
        // walk once to validate framing
        let expected = ve.len();
        let mut seen = 0usize;
        for element in ve.raw_elements() {
            element?;
            seen += 1;
        }
        if seen != expected {
            return Err(GraphError::CorruptDocument("traversal element count mismatch"));
        }
        Ok(ve)
    }

    /// Serialized bytes, count prefix included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of stored elements (vertices plus edges).
    pub fn len(&self) -> usize {
        let mut count = [0u8; 4];
        count.copy_from_slice(&self.bytes[0..4]);
        u32::from_le_bytes(count) as usize
    }

    /// True when the traversal holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of edges in the traversal.
    pub fn edge_count(&self) -> usize {
        self.len() / 2
    }

    fn raw_elements(&self) -> RawElements<'_> {
        RawElements {
            bytes: &self.bytes,
            offset: 4,
            remaining: self.len(),
        }
    }

    /// Decodes the stored elements in order.
    pub fn elements(&self) -> Result<Vec<PathElement>> {
        let mut out = Vec::with_capacity(self.len());
        for (i, raw) in self.raw_elements().enumerate() {
            let doc = Bdm::from_bytes(raw?.to_vec())?;
            let value = doc.root_value()?;
            let element = match value {
                BdmValue::Vertex(v) if i % 2 == 0 => PathElement::Vertex(Vertex {
                    id: v.id,
                    label: v.label,
                    properties: Bdm::build(&v.properties)?,
                }),
                BdmValue::Edge(e) if i % 2 == 1 => PathElement::Edge(Edge {
                    id: e.id,
                    start_id: e.start_id,
                    end_id: e.end_id,
                    label: e.label,
                    properties: Bdm::build(&e.properties)?,
                }),
                _ => {
                    return Err(GraphError::CorruptDocument(
                        "traversal element out of alternation order",
                    ))
                }
            };
            out.push(element);
        }
        Ok(out)
    }

    /// Extracts the edge ids without decoding property payloads.
    pub fn edge_ids(&self) -> Result<Vec<GraphId>> {
        let mut ids = Vec::with_capacity(self.edge_count());
        for (i, raw) in self.raw_elements().enumerate() {
            let raw = raw?;
            if i % 2 == 1 {
                ids.push(Bdm::entity_id_of(raw)?);
            }
        }
        Ok(ids)
    }
}

struct RawElements<'a> {
    bytes: &'a [u8],
    offset: usize,
    remaining: usize,
}

impl<'a> Iterator for RawElements<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.offset + 4 > self.bytes.len() {
            self.remaining = 0;
            return Some(Err(GraphError::CorruptDocument("traversal truncated")));
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&self.bytes[self.offset..self.offset + 4]);
        let total = u32::from_le_bytes(len) as usize;
        if total < 4 || self.offset + total > self.bytes.len() {
            self.remaining = 0;
            return Some(Err(GraphError::CorruptDocument("traversal element truncated")));
        }
        let slice = &self.bytes[self.offset..self.offset + total];
        self.offset += total;
        self.remaining -= 1;
        Some(Ok(slice))
    }
}

/// The raw graphid array one found path is materialized from.
///
/// The array interleaves vertices and edges: slot 0 is the start vertex,
/// odd slots are edges, and slot `2n` is the vertex reached after the n-th
/// edge, so its length is always `2 * edges + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct PathContainer {
    /// Interleaved vertex/edge identifiers.
    pub ids: Vec<GraphId>,
}

impl PathContainer {
    /// Allocates a container sized for the given number of edges.
    pub fn with_edge_count(edges: usize) -> Self {
        PathContainer {
            ids: vec![NULL_GRAPH_ID; edges * 2 + 1],
        }
    }

    /// Number of edges the container describes.
    pub fn edge_count(&self) -> usize {
        self.ids.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_id_splits_label_and_entity() {
        let id = GraphId::new(LabelId(7), 42);
        assert_eq!(id.label_id(), LabelId(7));
        assert_eq!(id.entity_id(), 42);
    }

    #[test]
    fn graph_id_masks_oversized_entity() {
        let id = GraphId::new(LabelId(1), u64::MAX);
        assert_eq!(id.label_id(), LabelId(1));
        assert_eq!(id.entity_id(), (1 << ENTITY_ID_BITS) - 1);
    }

    #[test]
    fn path_container_sizing() {
        let pc = PathContainer::with_edge_count(3);
        assert_eq!(pc.ids.len(), 7);
        assert_eq!(pc.edge_count(), 3);
    }
}
