pub mod config;
pub mod entity;
pub mod ids;
pub mod net;
pub mod replication;
pub mod simulation;

pub use config::{CharacterTuning, ReconcileConfig, SessionConfig, VehicleTuning};
pub use entity::{
    Character, CharacterFlags, Entity, MatchPhase, MatchState, PendingPose, Vehicle, VehicleFlags,
    VehicleSnapshot,
};
pub use ids::{
    CHARACTER_ID_BASE, DYNAMIC_ID_BASE, EntityClass, MATCH_STATE_ID, VEHICLE_ID_BASE, character_id,
    classify, vehicle_id,
};
pub use net::{
    ByteReader, ByteWriter, CharacterInput, DEFAULT_PORT, DEFAULT_TICK_RATE, DecodeError,
    MAX_PACKET_SIZE, Message, ScoreRow, SnapshotEntry, UdpEndpoint, VehicleInput,
};
pub use replication::{Registry, SyncMode};
pub use simulation::FixedTimestep;
