//! Transformation context: the scope stack and the clause chain.
//!
//! The original design threads a mutable parse state through every
//! transform routine, with child states nested per sub-query. Here the
//! context owns a stack of scopes: each clause (and each sub-query) is
//! transformed inside its own scope, and name resolution walks the stack
//! outward. Children are always closed before their parent continues, and
//! closing a child hands its entities up with the current-clause flag
//! cleared.

use tracing::debug;

use crate::ast::Clause;
use crate::catalog::{GraphRef, LabelCatalog};
use crate::rel::{
    BuiltinFunc, ColumnRef, Expr, FromItem, Query, RangeTableEntry, RteKind, TargetEntry,
    ValueType,
};
use crate::transform::entity::{EntityRegistry, TransformEntity};
use crate::transform::errors::{ErrorKind, TransformResult};

/// Wraps an expression in the volatile identity call, preserving its type.
pub(crate) fn wrap_volatile(expr: Expr) -> Expr {
    let ty = expr.value_type();
    Expr::Func {
        func: BuiltinFunc::VolatileWrapper,
        args: vec![expr],
        ty,
    }
}

/// Appends the typed-null sentinel column the mutating clauses lead with.
pub(crate) fn push_null_sentinel(query: &mut Query) {
    let resno = query.next_resno();
    query.target_list.push(TargetEntry {
        expr: Expr::Null {
            ty: ValueType::Document,
        },
        name: NULL_SENTINEL_COLUMN.to_owned(),
        resno,
        junk: false,
    });
}

/// Alias under which a previous clause's sub-query is ranged.
pub const PREV_CLAUSE_ALIAS: &str = "_";

/// Alias of the right side of an optional-match / merge lateral join.
pub const OPT_RIGHT_ALIAS: &str = "_R";

/// Output name of the leading null sentinel column of mutating clauses.
pub const NULL_SENTINEL_COLUMN: &str = "_null";

/// A visibility record for one range-table entry.
#[derive(Clone, Copy, Debug)]
pub struct NsItem {
    /// Index into the owning scope's range table.
    pub rte: usize,
    /// The entry is visible by relation alias.
    pub rel_visible: bool,
    /// The entry's columns are visible by bare name.
    pub cols_visible: bool,
    /// Only visible while a lateral transform is active.
    pub lateral_only: bool,
}

/// Per-clause (and per-sub-query) transformation scope.
#[derive(Debug, Default)]
pub struct Scope {
    /// Pattern entities registered while transforming this scope.
    pub entities: EntityRegistry,
    /// Property-containment quals collected by the pattern resolver.
    pub property_quals: Vec<Expr>,
    /// Range table being built.
    pub range_table: Vec<RangeTableEntry>,
    /// From-clause items being built.
    pub joinlist: Vec<FromItem>,
    /// Name visibility.
    pub namespace: Vec<NsItem>,
    /// A lateral transform is active below this scope.
    pub lateral_active: bool,
    /// Expressions are being transformed in WHERE mode: only existing
    /// variables may be referenced.
    pub where_mode: bool,
    /// An aggregate call was transformed.
    pub has_aggs: bool,
    /// A sub-link was transformed.
    pub has_sublinks: bool,
    /// A set-returning call entered the target list.
    pub has_target_srfs: bool,
}

impl Scope {
    /// Adds a range-table entry, returning its index.
    pub fn add_rte(&mut self, rte: RangeTableEntry) -> usize {
        self.range_table.push(rte);
        self.range_table.len() - 1
    }

    /// Finds a range-table entry index by alias.
    pub fn rte_by_alias(&self, alias: &str) -> Option<usize> {
        self.range_table.iter().position(|rte| rte.alias == alias)
    }
}

/// A doubly-walkable view over the statement's clause list.
///
/// The parser emits clauses innermost first, so the chain enters at the
/// last element and walks `prev()`-first; `current()` may be substituted
/// (the `WITH`-as-`RETURN` and `MERGE`-as-`MATCH` rewrites) without
/// touching the underlying statement.
#[derive(Clone, Copy)]
pub struct ClauseChain<'a> {
    clauses: &'a [Clause],
    index: usize,
    replacement: Option<&'a Clause>,
}

impl<'a> ClauseChain<'a> {
    /// Enters a statement at its final clause.
    pub fn new(clauses: &'a [Clause]) -> Option<Self> {
        if clauses.is_empty() {
            return None;
        }
        Some(ClauseChain {
            clauses,
            index: clauses.len() - 1,
            replacement: None,
        })
    }

    /// A chain over a single detached clause.
    pub fn single(clause: &'a Clause) -> Self {
        ClauseChain {
            clauses: std::slice::from_ref(clause),
            index: 0,
            replacement: None,
        }
    }

    /// The clause at the current position.
    pub fn current(&self) -> &'a Clause {
        self.replacement.unwrap_or(&self.clauses[self.index])
    }

    /// The chain position one clause earlier, if any.
    pub fn prev(&self) -> Option<ClauseChain<'a>> {
        if self.index == 0 {
            return None;
        }
        Some(ClauseChain {
            clauses: self.clauses,
            index: self.index - 1,
            replacement: None,
        })
    }

    /// Whether a later clause consumes this one's output.
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.clauses.len()
    }

    /// Substitutes the current clause, keeping the chain links. The result
    /// lives no longer than the substituted clause.
    pub fn with_replacement<'b>(&self, clause: &'b Clause) -> ClauseChain<'b>
    where
        'a: 'b,
    {
        ClauseChain {
            clauses: self.clauses,
            index: self.index,
            replacement: Some(clause),
        }
    }
}

/// The clause transformer.
///
/// One instance transforms one statement against one graph; it owns the
/// scope stack and a monotonically increasing default-alias counter.
pub struct Transformer<'cat> {
    pub(crate) catalog: &'cat mut dyn LabelCatalog,
    pub(crate) graph: GraphRef,
    pub(crate) scopes: Vec<Scope>,
    default_alias_seq: u32,
    in_recursive_cte: bool,
}

impl<'cat> Transformer<'cat> {
    /// Creates a transformer for one graph.
    pub fn new(catalog: &'cat mut dyn LabelCatalog, graph: GraphRef) -> Self {
        Transformer {
            catalog,
            graph,
            scopes: Vec::new(),
            default_alias_seq: 0,
            in_recursive_cte: false,
        }
    }

    /// Marks that the statement is being analyzed inside a recursive
    /// common-table-expression context, which set operations reject.
    pub fn with_recursive_cte_context(mut self) -> Self {
        self.in_recursive_cte = true;
        self
    }

    pub(crate) fn in_recursive_cte(&self) -> bool {
        self.in_recursive_cte
    }

    /// Transforms a whole statement (clauses in parser emission order,
    /// innermost first) into a relational query.
    pub fn transform_statement(&mut self, clauses: &[Clause]) -> TransformResult<Query> {
        let chain = ClauseChain::new(clauses).ok_or(ErrorKind::InternalInvariantViolated(
            "empty clause list",
        ))?;
        self.scopes.push(Scope::default());
        let result = self.transform_clause(chain);
        self.scopes.pop();
        result
    }

    pub(crate) fn scope(&self) -> &Scope {
        self.scopes.last().unwrap_or_else(|| {
            // transform entry points always push a scope first
            panic!("transformer used without a scope")
        })
    }

    pub(crate) fn scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().unwrap_or_else(|| {
            panic!("transformer used without a scope")
        })
    }

    /// Generates a fresh default alias.
    pub(crate) fn next_default_alias(&mut self) -> String {
        let alias = format!("_anon_{}", self.default_alias_seq);
        self.default_alias_seq += 1;
        alias
    }

    /// Finds a transform entity by name, walking scopes outward. Only
    /// WHERE-mode resolution (sub-patterns referencing enclosing pattern
    /// variables) looks past the current clause's scope.
    pub(crate) fn find_entity(&self, name: &str) -> Option<&TransformEntity> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.entities.find_any(name))
    }

    /// Finds a transform entity in the current clause's scope only.
    pub(crate) fn find_entity_current(&self, name: &str) -> Option<&TransformEntity> {
        self.scope().entities.find_any(name)
    }

    /// Finds a transform entity by name and kind in the current clause's
    /// scope.
    pub(crate) fn find_entity_kind(
        &self,
        name: &str,
        kind: crate::transform::entity::EntityKind,
    ) -> Option<&TransformEntity> {
        self.scope().entities.find(name, kind)
    }

    /// Resolves a bare name against the visible namespace, producing an
    /// up-level column reference when the match lives in an outer scope.
    pub(crate) fn lookup_column(&self, name: &str) -> Option<Expr> {
        for (level, scope) in self.scopes.iter().rev().enumerate() {
            for item in &scope.namespace {
                if !item.cols_visible {
                    continue;
                }
                if item.lateral_only && !scope.lateral_active {
                    continue;
                }
                let rte = &scope.range_table[item.rte];
                if let Some((i, col)) = rte
                    .columns
                    .iter()
                    .enumerate()
                    .find(|(_, col)| col.name == name)
                {
                    return Some(Expr::Column(ColumnRef {
                        level,
                        rte: item.rte,
                        attno: i + 1,
                        name: col.name.clone(),
                        ty: col.ty,
                    }));
                }
            }
        }
        None
    }

    /// Transforms a chained clause into a sub-query and ranges it in the
    /// current scope. When `add_to_query` is set, the entry also joins the
    /// from-clause and its columns become name-visible.
    pub(crate) fn transform_clause_as_subquery(
        &mut self,
        chain: ClauseChain<'_>,
        alias: &str,
        add_to_query: bool,
    ) -> TransformResult<usize> {
        let lateral = self.scope().lateral_active;
        let where_mode = self.scope().where_mode;

        self.scopes.push(Scope {
            where_mode,
            ..Scope::default()
        });
        let result = self.transform_clause(chain);
        let mut closed = match self.scopes.pop() {
            Some(scope) => scope,
            None => {
                return Err(ErrorKind::InternalInvariantViolated("scope stack underflow").into())
            }
        };
        let query = result?;

        // hand the child's entities up, no longer current-clause
        closed.entities.advance_to_next_clause();
        let entities = closed.entities.drain();
        let parent = self.scope_mut();
        parent.entities.absorb(entities);
        parent.has_sublinks |= closed.has_sublinks;

        let columns = query.output_columns();
        let idx = parent.add_rte(RangeTableEntry {
            alias: alias.to_owned(),
            kind: RteKind::Subquery {
                query: Box::new(query),
                lateral,
            },
            columns,
        });
        if add_to_query {
            parent.joinlist.push(FromItem::RteRef(idx));
            parent.namespace.push(NsItem {
                rte: idx,
                rel_visible: false,
                cols_visible: true,
                lateral_only: false,
            });
        }
        Ok(idx)
    }

    /// Transforms the previous clause and expands its output columns into
    /// this query's target list, passing every earlier variable through.
    pub(crate) fn handle_prev_clause(
        &mut self,
        query: &mut Query,
        prev: ClauseChain<'_>,
    ) -> TransformResult<usize> {
        let rte = self.transform_clause_as_subquery(prev, PREV_CLAUSE_ALIAS, true)?;
        self.expand_rte_into_target_list(query, rte);
        Ok(rte)
    }

    /// Appends one target entry per column of `rte`.
    pub(crate) fn expand_rte_into_target_list(&mut self, query: &mut Query, rte: usize) {
        let columns = self.scope().range_table[rte].columns.clone();
        for (i, col) in columns.iter().enumerate() {
            let resno = query.next_resno();
            query.target_list.push(TargetEntry {
                expr: Expr::Column(ColumnRef {
                    level: 0,
                    rte,
                    attno: i + 1,
                    name: col.name.clone(),
                    ty: col.ty,
                }),
                name: col.name.clone(),
                resno,
                junk: false,
            });
        }
    }

    /// Finds a target entry by name, wraps its expression in the volatile
    /// identity call so the planner cannot prune it, and returns its resno.
    pub(crate) fn mark_target_volatile(&self, query: &mut Query, name: &str) -> Option<usize> {
        for te in query.target_list.iter_mut() {
            if !te.junk && te.name == name {
                let inner = std::mem::replace(
                    &mut te.expr,
                    Expr::Null {
                        ty: crate::rel::ValueType::Unknown,
                    },
                );
                te.expr = wrap_volatile(inner);
                return Some(te.resno);
            }
        }
        None
    }

    /// Moves the scope's accumulated range table and join list into the
    /// query, installing `qual` as the join-tree qualifier.
    pub(crate) fn finalize_query(&mut self, query: &mut Query, qual: Option<Expr>) {
        let scope = self.scope_mut();
        query.range_table = std::mem::take(&mut scope.range_table);
        query.jointree.items = std::mem::take(&mut scope.joinlist);
        query.jointree.qual = qual;
        query.has_aggs |= scope.has_aggs;
        query.has_sublinks |= scope.has_sublinks;
        query.has_target_srfs |= scope.has_target_srfs;
        debug!(
            rtes = query.range_table.len(),
            targets = query.target_list.len(),
            "clause transformed"
        );
    }
}
