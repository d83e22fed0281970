//! Transform-entity registry.
//!
//! Each named pattern element resolved within a clause leaves a record
//! here: its kind, the expression that rebuilds it, and whether it entered
//! the join tree. The registry is the substrate for variable scoping — a
//! later clause sees earlier entities with `declared_in_current_clause`
//! cleared.

use crate::ast::RelDir;
use crate::rel::Expr;

/// What a registered pattern entity is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    /// A vertex element.
    Vertex,
    /// A fixed-length edge element.
    Edge,
    /// A variable-length edge element.
    VleEdge,
}

/// One registered pattern entity.
#[derive(Clone, Debug)]
pub struct TransformEntity {
    /// Entity kind.
    pub kind: EntityKind,
    /// Variable name; anonymous entities carry their generated alias.
    pub name: Option<String>,
    /// Resolved label name (defaults applied).
    pub label: Option<String>,
    /// The element carried a property constraint.
    pub has_props: bool,
    /// Declared by the clause currently being transformed.
    pub declared_in_current_clause: bool,
    /// The entity's relation participates in the join tree.
    pub in_join_tree: bool,
    /// Expression rebuilding the entity value, when it has one.
    pub expr: Option<Expr>,
    /// Range-table index of the entity's label relation scan, when it was
    /// given one in the current query.
    pub rte: Option<usize>,
    /// Direction, for edges.
    pub dir: Option<RelDir>,
}

impl TransformEntity {
    /// Creates an entity record for the current clause.
    pub fn new(kind: EntityKind, name: Option<String>, expr: Option<Expr>) -> Self {
        let in_join_tree = expr.is_some();
        TransformEntity {
            kind,
            name,
            label: None,
            has_props: false,
            declared_in_current_clause: true,
            in_join_tree,
            expr,
            rte: None,
            dir: None,
        }
    }
}

/// Per-scope list of transform entities.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<TransformEntity>,
}

impl EntityRegistry {
    /// Registers an entity, returning its index.
    pub fn add(&mut self, entity: TransformEntity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// All entities, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TransformEntity> {
        self.entities.iter()
    }

    /// Finds an entity by name and kind.
    pub fn find(&self, name: &str, kind: EntityKind) -> Option<&TransformEntity> {
        self.entities
            .iter()
            .find(|e| e.kind == kind && e.name.as_deref() == Some(name))
    }

    /// Finds an entity by name regardless of kind.
    pub fn find_any(&self, name: &str) -> Option<&TransformEntity> {
        self.entities
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
    }

    /// Clears the current-clause flag on every entity; called when a
    /// clause's transform finishes so the next clause sees them as
    /// previously declared.
    pub fn advance_to_next_clause(&mut self) {
        for entity in &mut self.entities {
            entity.declared_in_current_clause = false;
        }
    }

    /// Moves all entities out of the registry.
    pub fn drain(&mut self) -> Vec<TransformEntity> {
        std::mem::take(&mut self.entities)
    }

    /// Absorbs entities handed up from a closed child scope.
    pub fn absorb(&mut self, entities: Vec<TransformEntity>) {
        self.entities.extend(entities);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_kind() {
        let mut registry = EntityRegistry::default();
        registry.add(TransformEntity::new(
            EntityKind::Vertex,
            Some("a".into()),
            None,
        ));
        registry.add(TransformEntity::new(EntityKind::Edge, Some("e".into()), None));

        assert!(registry.find("a", EntityKind::Vertex).is_some());
        assert!(registry.find("a", EntityKind::Edge).is_none());
        assert!(registry.find_any("e").is_some());
        assert!(registry.find_any("missing").is_none());
    }

    #[test]
    fn advance_clears_current_clause_flags() {
        let mut registry = EntityRegistry::default();
        registry.add(TransformEntity::new(
            EntityKind::Vertex,
            Some("a".into()),
            None,
        ));
        registry.advance_to_next_clause();
        assert!(!registry.find_any("a").unwrap().declared_in_current_clause);
    }
}
