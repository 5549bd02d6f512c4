use std::collections::HashMap;

use crate::entity::Entity;
use crate::ids::DYNAMIC_ID_BASE;

/// ID-keyed entity arena. The registry owns the entities; everything else
/// holds IDs. Removals are deferred and committed between ticks.
#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<u32, Entity>,
    next_dynamic_id: u32,
    pending_removals: Vec<u32>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_dynamic_id: DYNAMIC_ID_BASE,
            pending_removals: Vec::new(),
        }
    }

    /// ID 0 means "unassigned" and gets the next free dynamic ID; a nonzero
    /// ID is honored, replacing any previous holder.
    pub fn insert(&mut self, mut entity: Entity) -> u32 {
        let id = match entity.id() {
            0 => {
                let id = self.allocate_id();
                entity.set_id(id);
                id
            }
            id => id,
        };

        if self.entities.insert(id, entity).is_some() {
            log::warn!("entity {id:#x} re-registered; previous entry replaced");
        }
        id
    }

    fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_dynamic_id;
            self.next_dynamic_id = self.next_dynamic_id.wrapping_add(1).max(DYNAMIC_ID_BASE);
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    /// Queue an entity for removal at the next `commit_removals`.
    pub fn despawn(&mut self, id: u32) {
        if self.entities.contains_key(&id) && !self.pending_removals.contains(&id) {
            self.pending_removals.push(id);
        }
    }

    /// Commit queued removals; the returned IDs drive the despawn broadcast.
    pub fn commit_removals(&mut self) -> Vec<u32> {
        let mut removed = Vec::new();
        for id in self.pending_removals.drain(..) {
            if self.entities.remove(&id).is_some() {
                removed.push(id);
            }
        }
        removed
    }

    /// Reset every entity's send cache so the next broadcast is full-state.
    pub fn mark_all_dirty(&mut self) {
        for entity in self.entities.values_mut() {
            entity.mark_all_dirty();
        }
    }

    pub fn get(&self, id: u32) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Entity)> {
        self.entities.iter().map(|(&id, e)| (id, e))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut Entity)> {
        self.entities.iter_mut().map(|(&id, e)| (id, e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, Vehicle};
    use glam::{Quat, Vec3};

    fn character(id: u32) -> Entity {
        Entity::Character(Character::new(id, Vec3::ZERO))
    }

    #[test]
    fn nonzero_id_is_honored() {
        let mut registry = Registry::new();
        let id = registry.insert(character(0x1005));
        assert_eq!(id, 0x1005);
        assert!(registry.contains(0x1005));
    }

    #[test]
    fn zero_id_allocates_above_dynamic_base() {
        let mut registry = Registry::new();
        let a = registry.insert(character(0));
        let b = registry.insert(character(0));
        assert_eq!(a, DYNAMIC_ID_BASE);
        assert_eq!(b, DYNAMIC_ID_BASE + 1);
        assert_eq!(registry.get(a).unwrap().id(), a);
    }

    #[test]
    fn despawn_is_deferred_until_commit() {
        let mut registry = Registry::new();
        let id = registry.insert(Entity::Vehicle(Vehicle::new(
            0x2000,
            Vec3::ZERO,
            Quat::IDENTITY,
        )));

        registry.despawn(id);
        assert!(registry.contains(id));

        let removed = registry.commit_removals();
        assert_eq!(removed, vec![id]);
        assert!(!registry.contains(id));
    }

    #[test]
    fn double_despawn_commits_once() {
        let mut registry = Registry::new();
        let id = registry.insert(character(0x1001));
        registry.despawn(id);
        registry.despawn(id);
        assert_eq!(registry.commit_removals(), vec![id]);
        assert!(registry.commit_removals().is_empty());
    }

    #[test]
    fn despawn_of_unknown_id_is_a_no_op() {
        let mut registry = Registry::new();
        registry.despawn(0xFFFF);
        assert!(registry.commit_removals().is_empty());
    }
}
