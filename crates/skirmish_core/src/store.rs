//! Entity arena keyed by stable ids.
//!
//! The store is the sole owner of entity data. Ids are allocated
//! monotonically and never reused, so a stale id simply fails to resolve.
//! Destruction is deferred: entities are marked during the tick and
//! removed together in end-of-tick cleanup.

use std::collections::{BTreeMap, BTreeSet};

use crate::components::{Entity, EntityId, PlayerId};

/// Entity storage with deferred removal.
#[derive(Debug, Clone)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
    pending_removal: BTreeSet<EntityId>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
            pending_removal: BTreeSet::new(),
        }
    }

    /// Allocate an id and insert the entity built from it.
    pub fn spawn(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        let mut entity = build(id);
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Insert a new entity, overwriting its id, and return the id.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        self.spawn(move |_| entity)
    }

    /// The id the next spawn will receive.
    #[must_use]
    pub const fn peek_next_id(&self) -> EntityId {
        self.next_id
    }

    /// Get an entity by ID, including ones marked for removal.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Resolve a weak reference: present, alive and not marked for removal.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> Option<&Entity> {
        if self.pending_removal.contains(&id) {
            return None;
        }
        self.entities.get(&id).filter(|e| !e.health.is_dead())
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate over all entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterate mutably over all entities in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Live entities owned by `player`, in ascending id order.
    pub fn owned_by(&self, player: PlayerId) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |e| e.owner == player && !self.pending_removal.contains(&e.id))
    }

    /// Mark an entity for removal at end of tick.
    ///
    /// Returns `true` if this call newly marked it.
    pub fn mark_destroyed(&mut self, id: EntityId) -> bool {
        self.entities.contains_key(&id) && self.pending_removal.insert(id)
    }

    /// Check if an entity is waiting for end-of-tick removal.
    #[must_use]
    pub fn is_marked(&self, id: EntityId) -> bool {
        self.pending_removal.contains(&id)
    }

    /// Number of entities waiting for removal.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_removal.len()
    }

    /// Remove every marked entity, returning them in ascending id order.
    pub fn drain_destroyed(&mut self) -> Vec<Entity> {
        let pending = std::mem::take(&mut self.pending_removal);
        pending
            .into_iter()
            .filter_map(|id| self.entities.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EntityKind, Health, Unit, UnitClass};
    use crate::math::{Fixed, Vec2Fixed};
    use crate::production::UnitTypeId;

    fn soldier(id: EntityId) -> Entity {
        Entity {
            id,
            owner: 0,
            team: 0,
            position: Vec2Fixed::ZERO,
            health: Health::new(10),
            kind: EntityKind::Unit(Unit::new(UnitTypeId(0), UnitClass::Infantry, Fixed::ONE)),
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut store = EntityStore::new();
        let a = store.spawn(soldier);
        let b = store.spawn(soldier);
        assert!(b > a);

        store.mark_destroyed(b);
        store.drain_destroyed();
        let c = store.spawn(soldier);
        assert!(c > b);
        assert!(store.get(b).is_none());
    }

    #[test]
    fn test_insert_overwrites_id() {
        let mut store = EntityStore::new();
        let id = store.insert(soldier(999));
        assert_eq!(store.get(id).map(|e| e.id), Some(id));
        assert_ne!(id, 999);
    }

    #[test]
    fn test_deferred_removal() {
        let mut store = EntityStore::new();
        let id = store.spawn(soldier);

        assert!(store.mark_destroyed(id));
        assert!(!store.mark_destroyed(id));
        // Still present until cleanup, but no longer resolvable
        assert!(store.contains(id));
        assert!(store.resolve(id).is_none());
        assert_eq!(store.owned_by(0).count(), 0);

        let removed = store.drain_destroyed();
        assert_eq!(removed.len(), 1);
        assert!(!store.contains(id));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_resolve_rejects_dead() {
        let mut store = EntityStore::new();
        let id = store.spawn(soldier);
        if let Some(e) = store.get_mut(id) {
            e.health.apply_damage(100);
        }
        assert!(store.resolve(id).is_none());
        assert!(!store.mark_destroyed(12345));
    }
}
