//! Clause transformer.
//!
//! Converts a parsed clause chain into a relational [`Query`] tree with
//! graph-aware join predicates, label filters, property-containment quals,
//! edge-uniqueness enforcement, set-operation trees, and lateral-join
//! plumbing. Each clause kind has its own transform routine; the mutating
//! clauses additionally serialize their execution metadata into marker
//! function calls the executor interprets.

pub mod context;
pub mod create;
pub mod delete;
pub mod entity;
pub mod errors;
pub mod expr;
pub mod match_clause;
pub mod merge;
pub mod metadata;
pub mod pattern;
pub mod projection;
pub mod set;
pub mod set_ops;
pub mod unwind;

use tracing::debug;

use crate::ast::{Clause, SetOp};
use crate::rel::{Query, QuerySource};

pub use context::{ClauseChain, Transformer};
pub use entity::{EntityKind, TransformEntity};
pub use errors::{ErrorKind, TransformError, TransformResult};

impl<'cat> Transformer<'cat> {
    /// Dispatches one chained clause to its transform routine.
    pub(crate) fn transform_clause(&mut self, chain: ClauseChain<'_>) -> TransformResult<Query> {
        let mut query = match chain.current() {
            Clause::Return(rc) if rc.op == SetOp::None => {
                debug!("transforming RETURN");
                projection::transform_return(self, chain, rc)
            }
            Clause::Return(rc) => {
                debug!("transforming UNION");
                set_ops::transform_union(self, chain, rc)
            }
            Clause::With(wc) => {
                debug!("transforming WITH");
                projection::transform_with(self, chain, wc)
            }
            Clause::Match(mc) => {
                debug!(optional = mc.optional, "transforming MATCH");
                match_clause::transform_match(self, chain, mc)
            }
            Clause::Create(cc) => {
                debug!("transforming CREATE");
                create::transform_create(self, chain, cc)
            }
            Clause::Set(sc) => {
                debug!(remove = sc.is_remove, "transforming SET");
                set::transform_set(self, chain, sc)
            }
            Clause::Delete(dc) => {
                debug!(detach = dc.detach, "transforming DELETE");
                delete::transform_delete(self, chain, dc)
            }
            Clause::Merge(mc) => {
                debug!("transforming MERGE");
                merge::transform_merge(self, chain, mc)
            }
            Clause::Unwind(uc) => {
                debug!("transforming UNWIND");
                unwind::transform_unwind(self, chain, uc)
            }
            Clause::SubPattern(sp) => match_clause::transform_sub_pattern(self, sp),
        }?;

        query.source = QuerySource::Original;
        query.can_set_tag = true;
        Ok(query)
    }
}
