//! Clause metadata payloads.
//!
//! The mutating clauses serialize their execution plan (which entities to
//! insert, which tuple columns carry their values) into an opaque blob
//! embedded in a marker function call. The blob must survive copying
//! across memory contexts and prepared-statement replays, so it uses an
//! explicit versioned encoding; the decoder refuses unknown versions and
//! unknown fields.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Version written into every payload.
pub const METADATA_FORMAT_VERSION: u32 = 1;

/// Clause-level flags.
pub mod clause_flags {
    /// No flags.
    pub const NONE: u32 = 0;
    /// A previous clause feeds this one.
    pub const PREVIOUS_CLAUSE: u32 = 1;
    /// No later clause consumes this one's output.
    pub const TERMINAL: u32 = 2;
}

/// Per-target-node flags.
pub mod node_flags {
    /// The node inserts a new entity.
    pub const INSERT: u32 = 1;
    /// The node is bound to a variable.
    pub const IS_VARIABLE: u32 = 2;
    /// The node participates in a named path variable.
    pub const IN_PATH_VARIABLE: u32 = 4;
    /// An existing variable declared in the same clause; existence checks
    /// can be skipped at execution time.
    pub const EXISTING_DECLARED_SAME_CLAUSE: u32 = 8;
    /// A `MERGE` vertex bound by an earlier clause; only its id is used.
    pub const MERGE_EXISTS: u32 = 16;
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Versioned<T> {
    version: u32,
    payload: T,
}

/// Serializes a payload under the current format version.
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(&Versioned {
        version: METADATA_FORMAT_VERSION,
        payload,
    })
    .map_err(|e| GraphError::Serialization(e.to_string()))
}

/// Decodes a payload, rejecting unknown versions.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let versioned: Versioned<T> = serde_json::from_slice(bytes)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    if versioned.version != METADATA_FORMAT_VERSION {
        return Err(GraphError::Serialization(format!(
            "unsupported clause metadata version {}",
            versioned.version
        )));
    }
    Ok(versioned.payload)
}

/// Whether a target node creates a vertex or an edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TargetKind {
    /// A vertex.
    Vertex,
    /// An edge.
    Edge,
}

/// Where a new entity's identifier comes from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum IdSource {
    /// No id is generated (existing entity).
    None,
    /// The backing relation's id sequence.
    LabelSequence {
        /// Relation name.
        relation: String,
    },
}

/// Where a new entity's properties come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum PropSource {
    /// The relation's default (empty) document.
    Default,
    /// A serialized literal document.
    Literal(Vec<u8>),
    /// A named parameter bound at execution.
    Parameter(String),
    /// A column of the incoming tuple (1-based).
    TupleColumn(u32),
}

/// One entity of a `CREATE`/`MERGE` path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetNode {
    /// Vertex or edge.
    pub kind: TargetKind,
    /// Label name; empty when the default label applies.
    pub label_name: String,
    /// Bound variable, if any.
    pub variable_name: Option<String>,
    /// Catalog id of the backing relation's label.
    pub relid: u32,
    /// Identifier source.
    pub id_source: IdSource,
    /// Property source.
    pub prop_source: PropSource,
    /// Tuple column holding the entity value (1-based; 0 = none).
    pub tuple_position: u32,
    /// Edge direction in wire form (`-1`/`0`/`1`), vertices carry none.
    pub dir: Option<i64>,
    /// Node flags.
    pub flags: u32,
}

/// One transformed path of a `CREATE` pattern (or the single `MERGE` path).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetPath {
    /// Path variable name, if the path is bound.
    pub var_name: Option<String>,
    /// Tuple column the materialized path is written to (0 = none).
    pub path_position: u32,
    /// Entities in path order.
    pub target_nodes: Vec<TargetNode>,
}

/// Payload of the `create_clause` marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateClauseInfo {
    /// Graph name.
    pub graph_name: String,
    /// Graph catalog id.
    pub graph_oid: u32,
    /// Paths to create, in pattern order.
    pub paths: Vec<TargetPath>,
    /// Clause flags.
    pub flags: u32,
}

/// One `SET`/`REMOVE` item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItem {
    /// Target variable.
    pub var_name: String,
    /// Property being written or removed.
    pub prop_name: String,
    /// Tuple column holding the entity (1-based).
    pub entity_position: u32,
    /// Tuple column holding the new value (0 for removals).
    pub prop_position: u32,
    /// True for `REMOVE`.
    pub remove: bool,
}

/// Payload of the `set_clause` marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetClauseInfo {
    /// `SET` or `REMOVE`.
    pub clause_name: String,
    /// Graph name.
    pub graph_name: String,
    /// Update items, in clause order.
    pub items: Vec<UpdateItem>,
    /// Clause flags.
    pub flags: u32,
}

/// One `DELETE` item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteItem {
    /// Target variable.
    pub var_name: String,
    /// Tuple column holding the entity (1-based).
    pub entity_position: u32,
}

/// Payload of the `delete_clause` marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteClauseInfo {
    /// Graph name.
    pub graph_name: String,
    /// Graph catalog id.
    pub graph_oid: u32,
    /// `DETACH DELETE`.
    pub detach: bool,
    /// Items, in clause order.
    pub items: Vec<DeleteItem>,
    /// Clause flags.
    pub flags: u32,
}

/// Payload of the `merge_clause` marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeClauseInfo {
    /// Graph name.
    pub graph_name: String,
    /// Graph catalog id.
    pub graph_oid: u32,
    /// The merge path's creation metadata.
    pub path: TargetPath,
    /// Tuple column of the merge marker itself (1-based).
    pub merge_function_attr: u32,
    /// Clause flags.
    pub flags: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeleteClauseInfo {
        DeleteClauseInfo {
            graph_name: "g".into(),
            graph_oid: 1,
            detach: true,
            items: vec![DeleteItem {
                var_name: "n".into(),
                entity_position: 2,
            }],
            flags: clause_flags::TERMINAL,
        }
    }

    #[test]
    fn roundtrip() {
        let info = sample();
        let bytes = encode(&info).unwrap();
        let decoded: DeleteClauseInfo = decode(&bytes).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn rejects_bumped_version() {
        let info = sample();
        let mut bytes = encode(&info).unwrap();
        // bump the version field in place
        let text = String::from_utf8(bytes.clone()).unwrap();
        let bumped = text.replacen("\"version\":1", "\"version\":999", 1);
        bytes = bumped.into_bytes();
        assert!(decode::<DeleteClauseInfo>(&bytes).is_err());
    }
}
