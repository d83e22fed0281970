//! # Penumbra - Graph Query Frontend
//!
//! Penumbra is the core of a graph-query language frontend for a property
//! graph layered on a relational storage substrate: a clause transformer
//! that lowers a parsed query into a relational query tree, and a
//! variable-length path evaluator that enumerates the concrete paths
//! between two vertices.
//!
//! ## Quick Start
//!
//! ```rust
//! use penumbra::ast::{Clause, MatchClause, NodePattern, Path, PathElementAst, ReturnClause, ReturnItem};
//! use penumbra::catalog::{GraphRef, InMemoryCatalog};
//! use penumbra::transform::Transformer;
//!
//! let mut catalog = InMemoryCatalog::new(1).with_vertex_label(1, "person");
//! let graph = GraphRef { name: "g".into(), oid: 1 };
//!
//! // MATCH (a:person) RETURN a
//! let clauses = vec![
//!     Clause::Match(MatchClause {
//!         optional: false,
//!         pattern: vec![Path {
//!             var_name: None,
//!             elements: vec![PathElementAst::Node(NodePattern {
//!                 name: Some("a".into()),
//!                 label: Some("person".into()),
//!                 props: None,
//!                 location: None,
//!             })],
//!             location: None,
//!         }],
//!         where_clause: None,
//!         location: None,
//!     }),
//!     Clause::Return(ReturnClause::plain(vec![ReturnItem {
//!         expr: penumbra::ast::Expr::Variable("a".into()),
//!         alias: Some("a".into()),
//!         location: None,
//!     }])),
//! ];
//!
//! let query = Transformer::new(&mut catalog, graph).transform_statement(&clauses)?;
//! assert_eq!(query.target_list.len(), 1);
//! # Ok::<(), penumbra::transform::TransformError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Document model** ([`bdm`]): the tagged binary format behind
//!   property bags, filters, and traversal payloads
//! - **Entities** ([`model`]): identifiers, vertices, edges, traversals
//! - **Transformer** ([`transform`]): clause chain to relational query
//! - **Evaluator** ([`vle`]): depth-first path enumeration over the
//!   read-only graph cache
//!
//! The parser producing the clause AST, the executor consuming the query
//! tree, and the population of the catalog and cache are external
//! collaborators reached through the interfaces in [`ast`], [`rel`],
//! [`catalog`], and [`cache`].

pub mod ast;
pub mod bdm;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod model;
pub mod rel;
pub mod transform;
pub mod vle;

// Re-export the main public API
pub use crate::bdm::{Bdm, BdmValue};
pub use crate::cache::{GraphCache, InMemoryGraphCache};
pub use crate::catalog::{GraphRef, InMemoryCatalog, LabelCatalog, LabelKind};
pub use crate::error::{GraphError, Result};
pub use crate::model::{Edge, GraphId, LabelId, PathElement, VariableEdge, Vertex};
pub use crate::transform::{TransformError, Transformer};
pub use crate::vle::{enforce_edge_uniqueness, PathSearch, UniquenessArg};
