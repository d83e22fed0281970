//! Edge-uniqueness predicate.
//!
//! Evaluated per emitted row over the edge ids and traversals of one
//! pattern; the first duplicate id rejects the row. Traversal arguments
//! contribute every edge id they contain.

use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::model::{GraphId, VariableEdge};

/// One argument of the uniqueness predicate.
#[derive(Clone, Copy, Debug)]
pub enum UniquenessArg<'a> {
    /// A single edge id.
    EdgeId(GraphId),
    /// A traversal whose contained edge ids all participate.
    Traversal(&'a VariableEdge),
}

/// Returns false as soon as two edges share an id.
pub fn enforce_edge_uniqueness(args: &[UniquenessArg<'_>]) -> Result<bool> {
    let mut seen = FxHashSet::default();
    enforce_edge_uniqueness_with(&mut seen, args)
}

/// Scratch-buffer variant for callers evaluating the predicate once per
/// row; the set is cleared on entry.
pub fn enforce_edge_uniqueness_with(
    seen: &mut FxHashSet<GraphId>,
    args: &[UniquenessArg<'_>],
) -> Result<bool> {
    seen.clear();
    for arg in args {
        match arg {
            UniquenessArg::EdgeId(id) => {
                if !seen.insert(*id) {
                    return Ok(false);
                }
            }
            UniquenessArg::Traversal(ve) => {
                for id in ve.edge_ids()? {
                    if !seen.insert(id) {
                        return Ok(false);
                    }
                }
            }
        }
    }
    Ok(true)
}
