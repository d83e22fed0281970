//! Depth-first path enumeration.
//!
//! The search keeps a stack of edge frames and a path stack of committed
//! edges, plus a per-edge visited table. A frame whose edge is already
//! visited signals backtracking when it tops the path stack, or a loop
//! otherwise. State survives between emissions, so each call to `next`
//! resumes exactly where the previous path was found.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::ast::RelDir;
use crate::bdm::Bdm;
use crate::cache::{EdgeEntry, GraphCache};
use crate::error::{GraphError, Result};
use crate::model::{Edge, GraphId, PathContainer, PathElement, VariableEdge, Vertex};

#[derive(Default)]
struct EdgeState {
    visited: bool,
}

/// One frame of the traversal stack. The parent vertex is recorded only
/// for undirected traversal, where the vertex we came from decides which
/// endpoint to move to; directed traversals never touch it.
#[derive(Clone, Copy, Debug)]
struct EdgeFrame {
    edge: GraphId,
    parent: Option<GraphId>,
}

/// Cooperative cancellation flag checked once per traversal step.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lazy enumerator of the simple-edge paths between two vertices.
///
/// "Simple" means no repeated edge; vertices may repeat. Paths come out in
/// a deterministic pre-order determined by the cache's adjacency order.
pub struct PathSearch<'g> {
    cache: &'g dyn GraphCache,
    start: GraphId,
    end: GraphId,
    lo: u64,
    hi: Option<u64>,
    direction: RelDir,
    label: Option<String>,
    properties: Option<Bdm>,
    edge_state: FxHashMap<GraphId, EdgeState>,
    edge_stack: Vec<EdgeFrame>,
    path_stack: Vec<GraphId>,
    cancel: Option<CancelToken>,
    done: bool,
}

impl<'g> PathSearch<'g> {
    /// Builds the search context and loads the start vertex's candidate
    /// edges. `lo` defaults to 1; a missing `hi` is unbounded. A lower
    /// bound of zero yields nothing from this operator — the zero-length
    /// path belongs to the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: &'g dyn GraphCache,
        start: GraphId,
        end: GraphId,
        lo: Option<u64>,
        hi: Option<u64>,
        direction: RelDir,
        label: Option<String>,
        properties: Option<Bdm>,
    ) -> Result<Self> {
        let lo = lo.unwrap_or(1);
        let mut search = PathSearch {
            cache,
            start,
            end,
            lo,
            hi,
            direction,
            label,
            properties,
            edge_state: FxHashMap::default(),
            edge_stack: Vec::new(),
            path_stack: Vec::new(),
            cancel: None,
            done: lo == 0,
        };

        // nothing can be found when either endpoint is absent
        if !search.done
            && search.cache.vertex_entry(start).is_some()
            && search.cache.vertex_entry(end).is_some()
        {
            search.add_edges(start)?;
        } else {
            search.done = true;
        }

        Ok(search)
    }

    /// Installs a cooperative cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Pushes the candidate edges of `vertex_id` that pass the label and
    /// property constraints and have not been traversed yet.
    fn add_edges(&mut self, vertex_id: GraphId) -> Result<()> {
        let entry = self
            .cache
            .vertex_entry(vertex_id)
            .ok_or(GraphError::InternalInvariantViolated(
                "traversal reached an uncached vertex",
            ))?;

        let mut candidates: Vec<GraphId> = Vec::new();
        if self.direction != RelDir::Left {
            candidates.extend_from_slice(entry.edges_out());
        }
        if self.direction != RelDir::Right {
            candidates.extend_from_slice(entry.edges_in());
        }
        candidates.extend_from_slice(entry.edges_self());

        let parent = (self.direction == RelDir::None).then_some(vertex_id);
        for edge_id in candidates {
            let edge = self
                .cache
                .edge_entry(edge_id)
                .ok_or(GraphError::InternalInvariantViolated(
                    "adjacency references an uncached edge",
                ))?;
            let visited = self
                .edge_state
                .get(&edge_id)
                .map(|s| s.visited)
                .unwrap_or(false);
            // already-seen edges would close a loop
            if !visited && self.check_edge_constraints(edge)? {
                self.edge_stack.push(EdgeFrame {
                    edge: edge_id,
                    parent,
                });
            }
        }
        Ok(())
    }

    /// Label and property-containment filter for one edge.
    fn check_edge_constraints(&self, edge: &EdgeEntry) -> Result<bool> {
        if let Some(label) = &self.label {
            if edge.label != *label {
                return Ok(false);
            }
        }
        let Some(filter) = &self.properties else {
            return Ok(true);
        };
        // an edge with fewer properties than the constraint cannot match
        if filter.root()?.count() > edge.properties.root()?.count() {
            return Ok(false);
        }
        edge.properties.deep_contains(filter)
    }

    /// The vertex the traversal moves to across `edge`.
    fn next_vertex(&self, parent: Option<GraphId>, edge: &EdgeEntry) -> Result<GraphId> {
        match self.direction {
            RelDir::Right => Ok(edge.end_id),
            RelDir::Left => Ok(edge.start_id),
            RelDir::None => {
                let parent = parent.ok_or(GraphError::InternalInvariantViolated(
                    "undirected frame without a parent vertex",
                ))?;
                if edge.start_id == parent {
                    Ok(edge.end_id)
                } else if edge.end_id == parent {
                    Ok(edge.start_id)
                } else {
                    Err(GraphError::InternalInvariantViolated(
                        "frame parent matches neither edge endpoint",
                    ))
                }
            }
        }
    }

    /// Advances the DFS until a path within the hop bounds ends at the
    /// target vertex. Returns `false` when the search space is exhausted.
    /// State is left in place so the next call resumes here.
    fn find_a_path(&mut self) -> Result<bool> {
        while let Some(frame) = self.edge_stack.last().copied() {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    return Err(GraphError::Cancelled);
                }
            }

            let visited = self
                .edge_state
                .entry(frame.edge)
                .or_default()
                .visited;

            if visited {
                // topping the path stack means we are backtracking over
                // this edge; anything else is an interior loop candidate
                if self.path_stack.last() == Some(&frame.edge) {
                    self.path_stack.pop();
                    if let Some(state) = self.edge_state.get_mut(&frame.edge) {
                        state.visited = false;
                    }
                }
                self.edge_stack.pop();
                continue;
            }

            if let Some(state) = self.edge_state.get_mut(&frame.edge) {
                state.visited = true;
            }
            self.path_stack.push(frame.edge);

            let edge = self
                .cache
                .edge_entry(frame.edge)
                .ok_or(GraphError::InternalInvariantViolated(
                    "traversal references an uncached edge",
                ))?;
            let next_vid = self.next_vertex(frame.parent, edge)?;
            let len = self.path_stack.len() as u64;

            let found = next_vid == self.end
                && len >= self.lo
                && self.hi.map_or(true, |hi| len <= hi);

            // beyond the upper bound there is nothing to descend into
            if next_vid == self.end && self.hi.map_or(false, |hi| len > hi) {
                continue;
            }

            if self.hi.map_or(true, |hi| len < hi) {
                self.add_edges(next_vid)?;
            }

            if found {
                trace!(edges = self.path_stack.len(), "path found");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Copies the committed path into its interleaved graphid array:
    /// slot 0 is the start vertex, edges fill the odd slots newest-last,
    /// and interior vertices are recovered by walking the edges left to
    /// right, toggling endpoints.
    fn build_path_container(&self) -> Result<PathContainer> {
        let mut container = PathContainer::with_edge_count(self.path_stack.len());
        container.ids[0] = self.start;

        let mut index = container.ids.len() - 2;
        for &edge_id in self.path_stack.iter().rev() {
            container.ids[index] = edge_id;
            index = index.saturating_sub(2);
        }

        let mut vid = self.start;
        for index in (1..container.ids.len() - 1).step_by(2) {
            let edge = self
                .cache
                .edge_entry(container.ids[index])
                .ok_or(GraphError::InternalInvariantViolated(
                    "path references an uncached edge",
                ))?;
            vid = if vid == edge.start_id {
                edge.end_id
            } else {
                edge.start_id
            };
            container.ids[index + 1] = vid;
        }

        Ok(container)
    }

    /// Joins the path's entities into a traversal blob. The end vertex is
    /// the search's known endpoint and is not stored, so the sequence runs
    /// `V0, E1, V1, …, En`.
    fn materialize(&self) -> Result<VariableEdge> {
        let container = self.build_path_container()?;
        let mut elements = Vec::with_capacity(container.ids.len() - 1);

        for (index, &id) in container.ids[..container.ids.len() - 1].iter().enumerate() {
            if index % 2 == 0 {
                let v = self
                    .cache
                    .vertex_entry(id)
                    .ok_or(GraphError::InternalInvariantViolated(
                        "path references an uncached vertex",
                    ))?;
                elements.push(PathElement::Vertex(Vertex {
                    id: v.id,
                    label: v.label.clone(),
                    properties: v.properties.clone(),
                }));
            } else {
                let e = self
                    .cache
                    .edge_entry(id)
                    .ok_or(GraphError::InternalInvariantViolated(
                        "path references an uncached edge",
                    ))?;
                elements.push(PathElement::Edge(Edge {
                    id: e.id,
                    start_id: e.start_id,
                    end_id: e.end_id,
                    label: e.label.clone(),
                    properties: e.properties.clone(),
                }));
            }
        }

        VariableEdge::build(&elements)
    }
}

impl<'g> Iterator for PathSearch<'g> {
    type Item = Result<VariableEdge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.find_a_path() {
            Ok(true) => Some(self.materialize()),
            Ok(false) => {
                self.done = true;
                // release the state table eagerly; the stacks are empty
                self.edge_state = FxHashMap::default();
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
