mod character;
mod match_state;
mod vehicle;

pub use character::{Character, CharacterFlags};
pub use match_state::{MatchPhase, MatchState};
pub use vehicle::{NO_OCCUPANT, PendingPose, Vehicle, VehicleFlags, VehicleSnapshot};

use crate::net::{ByteReader, ByteWriter, DecodeError};

/// Every replicable entity kind. The wire never carries a kind tag, only the
/// ID range.
#[derive(Debug, Clone)]
pub enum Entity {
    Character(Character),
    Vehicle(Vehicle),
    Match(MatchState),
}

impl Entity {
    pub fn id(&self) -> u32 {
        match self {
            Entity::Character(c) => c.id(),
            Entity::Vehicle(v) => v.id(),
            Entity::Match(m) => m.id(),
        }
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        match self {
            Entity::Character(c) => c.set_id(id),
            Entity::Vehicle(v) => v.set_id(id),
            Entity::Match(_) => debug_assert_eq!(id, crate::ids::MATCH_STATE_ID),
        }
    }

    pub fn mark_all_dirty(&mut self) {
        match self {
            Entity::Character(c) => c.mark_all_dirty(),
            Entity::Vehicle(v) => v.mark_all_dirty(),
            Entity::Match(m) => m.mark_all_dirty(),
        }
    }

    pub fn write_snapshot(&mut self, w: &mut ByteWriter) {
        match self {
            Entity::Character(c) => c.write_snapshot(w),
            Entity::Vehicle(v) => v.write_snapshot(w),
            Entity::Match(m) => m.write_snapshot(w),
        }
    }

    pub fn apply_snapshot(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let mut r = ByteReader::new(data);
        match self {
            Entity::Character(c) => c.apply_snapshot(&mut r),
            Entity::Vehicle(v) => v.apply_snapshot(&mut r),
            Entity::Match(m) => m.apply_snapshot(&mut r),
        }
    }

    pub fn snapshot_size_hint(&self) -> usize {
        match self {
            Entity::Character(c) => c.snapshot_size_hint(),
            Entity::Vehicle(v) => v.snapshot_size_hint(),
            Entity::Match(m) => m.snapshot_size_hint(),
        }
    }

    pub fn as_character(&self) -> Option<&Character> {
        match self {
            Entity::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_character_mut(&mut self) -> Option<&mut Character> {
        match self {
            Entity::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_vehicle(&self) -> Option<&Vehicle> {
        match self {
            Entity::Vehicle(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vehicle_mut(&mut self) -> Option<&mut Vehicle> {
        match self {
            Entity::Vehicle(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_match_mut(&mut self) -> Option<&mut MatchState> {
        match self {
            Entity::Match(m) => Some(m),
            _ => None,
        }
    }
}
