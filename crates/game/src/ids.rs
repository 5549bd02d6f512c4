//! Entity ID ranges. Range membership is the only way a receiver classifies an
//! unrecognized incoming ID: there is no type tag in the spawn path, so these
//! bases are part of the wire protocol.

/// Singleton match/round state entity.
pub const MATCH_STATE_ID: u32 = 1;
/// Player characters live at `CHARACTER_ID_BASE + peer_id`.
pub const CHARACTER_ID_BASE: u32 = 0x1000;
/// Map vehicles live at `VEHICLE_ID_BASE + index`.
pub const VEHICLE_ID_BASE: u32 = 0x2000;
/// The registry allocates from here when an entity registers with ID 0.
pub const DYNAMIC_ID_BASE: u32 = 0x3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    MatchState,
    Character,
    Vehicle,
    /// Not in any known range. Receivers treat this as a no-op, not an error.
    Unknown,
}

pub fn classify(entity_id: u32) -> EntityClass {
    match entity_id {
        MATCH_STATE_ID => EntityClass::MatchState,
        id if (CHARACTER_ID_BASE..VEHICLE_ID_BASE).contains(&id) => EntityClass::Character,
        id if (VEHICLE_ID_BASE..DYNAMIC_ID_BASE).contains(&id) => EntityClass::Vehicle,
        _ => EntityClass::Unknown,
    }
}

pub fn character_id(peer_id: u32) -> u32 {
    CHARACTER_ID_BASE + peer_id
}

pub fn vehicle_id(index: u32) -> u32 {
    VEHICLE_ID_BASE + index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint_and_classified() {
        assert_eq!(classify(MATCH_STATE_ID), EntityClass::MatchState);
        assert_eq!(classify(character_id(1)), EntityClass::Character);
        assert_eq!(classify(VEHICLE_ID_BASE), EntityClass::Vehicle);
        assert_eq!(classify(DYNAMIC_ID_BASE - 1), EntityClass::Vehicle);
        assert_eq!(classify(0), EntityClass::Unknown);
        assert_eq!(classify(DYNAMIC_ID_BASE), EntityClass::Unknown);
        assert_eq!(classify(2), EntityClass::Unknown);
    }
}
