mod codec;
mod protocol;
mod transport;

pub use codec::{ByteReader, ByteWriter, DecodeError};
pub use protocol::{
    CharacterInput, DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_PACKET_SIZE, Message, ScoreRow,
    SnapshotEntry, TAG_CHARACTER_INPUT, TAG_DESPAWN, TAG_ENTITY_SNAPSHOTS, TAG_REMOVE_PEER,
    TAG_SCOREBOARD, TAG_VEHICLE_INPUT, TAG_WELCOME, VehicleInput,
};
pub use transport::{TransportStats, UdpEndpoint};
