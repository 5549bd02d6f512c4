use glam::{Quat, Vec3};

use skirmish::entity::{Character, Entity, MatchState, Vehicle};
use skirmish::{EntityClass, classify};

/// Build a visual-only proxy for a snapshot whose ID has no local entity yet.
/// IDs outside every known range return `None`: newer servers may stream
/// entity kinds this build does not know, and that must stay a silent skip.
pub fn spawn_proxy(entity_id: u32) -> Option<Entity> {
    match classify(entity_id) {
        EntityClass::MatchState => Some(Entity::Match(MatchState::default())),
        EntityClass::Character => Some(Entity::Character(Character::new(entity_id, Vec3::ZERO))),
        EntityClass::Vehicle => Some(Entity::Vehicle(Vehicle::new(
            entity_id,
            Vec3::ZERO,
            Quat::IDENTITY,
        ))),
        EntityClass::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish::{DYNAMIC_ID_BASE, MATCH_STATE_ID, character_id, vehicle_id};

    #[test]
    fn known_ranges_produce_matching_proxies() {
        assert!(matches!(
            spawn_proxy(MATCH_STATE_ID),
            Some(Entity::Match(_))
        ));
        assert!(matches!(
            spawn_proxy(character_id(3)),
            Some(Entity::Character(_))
        ));
        assert!(matches!(
            spawn_proxy(vehicle_id(0)),
            Some(Entity::Vehicle(_))
        ));
    }

    #[test]
    fn proxy_adopts_the_wire_id() {
        assert_eq!(spawn_proxy(character_id(7)).unwrap().id(), character_id(7));
        assert_eq!(spawn_proxy(vehicle_id(2)).unwrap().id(), vehicle_id(2));
    }

    #[test]
    fn unknown_ranges_are_skipped() {
        assert!(spawn_proxy(0).is_none());
        assert!(spawn_proxy(2).is_none());
        assert!(spawn_proxy(DYNAMIC_ID_BASE + 5).is_none());
        assert!(spawn_proxy(u32::MAX).is_none());
    }
}
