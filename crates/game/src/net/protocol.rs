use super::codec::{ByteReader, ByteWriter, DecodeError};

pub const MAX_PACKET_SIZE: usize = 1400;
pub const DEFAULT_PORT: u16 = 29477;
pub const DEFAULT_TICK_RATE: u32 = 30;

pub const TAG_VEHICLE_INPUT: u8 = 1;
pub const TAG_WELCOME: u8 = 2;
pub const TAG_REMOVE_PEER: u8 = 3;
pub const TAG_CHARACTER_INPUT: u8 = 4;
pub const TAG_ENTITY_SNAPSHOTS: u8 = 5;
pub const TAG_DESPAWN: u8 = 6;
pub const TAG_SCOREBOARD: u8 = 7;

/// Per-tick steering intents for a driven vehicle. `tick` is the client tick
/// the input was sampled at; the server only accepts non-decreasing ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleInput {
    pub tick: u32,
    pub vehicle_id: u32,
    pub throttle: f32,
    pub steer: f32,
    pub handbrake: bool,
    pub brake: bool,
    pub respawn_requested: bool,
    pub interact: bool,
}

/// Per-tick movement/aim/action intents for an on-foot character.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CharacterInput {
    pub tick: u32,
    pub move_x: f32,
    pub move_y: f32,
    pub jump: bool,
    pub primary_fire: bool,
    pub primary_fire_just_pressed: bool,
    pub reload: bool,
    pub interact: bool,
    pub sprint: bool,
    pub view_yaw: f32,
    pub view_pitch: f32,
}

/// One entry of a batched snapshot packet. The payload layout depends on the
/// entity kind, which the receiver derives from the ID range alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub entity_id: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRow {
    pub peer_id: u32,
    pub kills: u16,
    pub deaths: u16,
}

/// Every wire message. One leading tag byte, then fixed little-endian fields;
/// batches and strings carry a u16 count/length prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    VehicleInput(VehicleInput),
    Welcome { peer_id: u32 },
    RemovePeer { peer_id: u32 },
    CharacterInput(CharacterInput),
    EntitySnapshots(Vec<SnapshotEntry>),
    Despawn { entity_id: u32 },
    Scoreboard(Vec<ScoreRow>),
}

impl Message {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(64);
        match self {
            Message::VehicleInput(input) => {
                w.put_u8(TAG_VEHICLE_INPUT);
                w.put_u32(input.tick);
                w.put_u32(input.vehicle_id);
                w.put_f32(input.throttle);
                w.put_f32(input.steer);
                w.put_bool(input.handbrake);
                w.put_bool(input.brake);
                w.put_bool(input.respawn_requested);
                w.put_bool(input.interact);
            }
            Message::Welcome { peer_id } => {
                w.put_u8(TAG_WELCOME);
                w.put_u32(*peer_id);
            }
            Message::RemovePeer { peer_id } => {
                w.put_u8(TAG_REMOVE_PEER);
                w.put_u32(*peer_id);
            }
            Message::CharacterInput(input) => {
                w.put_u8(TAG_CHARACTER_INPUT);
                w.put_u32(input.tick);
                w.put_f32(input.move_x);
                w.put_f32(input.move_y);
                w.put_bool(input.jump);
                w.put_bool(input.primary_fire);
                w.put_bool(input.primary_fire_just_pressed);
                w.put_bool(input.reload);
                w.put_bool(input.interact);
                w.put_bool(input.sprint);
                w.put_f32(input.view_yaw);
                w.put_f32(input.view_pitch);
            }
            Message::EntitySnapshots(entries) => {
                w.put_u8(TAG_ENTITY_SNAPSHOTS);
                w.put_u16(entries.len() as u16);
                for entry in entries {
                    w.put_u32(entry.entity_id);
                    w.put_u16(entry.data.len() as u16);
                    w.put_bytes(&entry.data);
                }
            }
            Message::Despawn { entity_id } => {
                w.put_u8(TAG_DESPAWN);
                w.put_u32(*entity_id);
            }
            Message::Scoreboard(rows) => {
                w.put_u8(TAG_SCOREBOARD);
                w.put_u16(rows.len() as u16);
                for row in rows {
                    w.put_u32(row.peer_id);
                    w.put_u16(row.kills);
                    w.put_u16(row.deaths);
                }
            }
        }
        w.into_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
        let mut r = ByteReader::new(data);
        let tag = r.get_u8()?;
        let message = match tag {
            TAG_VEHICLE_INPUT => Message::VehicleInput(VehicleInput {
                tick: r.get_u32()?,
                vehicle_id: r.get_u32()?,
                throttle: r.get_f32()?,
                steer: r.get_f32()?,
                handbrake: r.get_bool()?,
                brake: r.get_bool()?,
                respawn_requested: r.get_bool()?,
                interact: r.get_bool()?,
            }),
            TAG_WELCOME => Message::Welcome {
                peer_id: r.get_u32()?,
            },
            TAG_REMOVE_PEER => Message::RemovePeer {
                peer_id: r.get_u32()?,
            },
            TAG_CHARACTER_INPUT => Message::CharacterInput(CharacterInput {
                tick: r.get_u32()?,
                move_x: r.get_f32()?,
                move_y: r.get_f32()?,
                jump: r.get_bool()?,
                primary_fire: r.get_bool()?,
                primary_fire_just_pressed: r.get_bool()?,
                reload: r.get_bool()?,
                interact: r.get_bool()?,
                sprint: r.get_bool()?,
                view_yaw: r.get_f32()?,
                view_pitch: r.get_f32()?,
            }),
            TAG_ENTITY_SNAPSHOTS => {
                let count = r.get_u16()? as usize;
                let mut entries = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    let entity_id = r.get_u32()?;
                    let len = r.get_u16()? as usize;
                    let data = r.get_bytes(len)?.to_vec();
                    entries.push(SnapshotEntry { entity_id, data });
                }
                Message::EntitySnapshots(entries)
            }
            TAG_DESPAWN => Message::Despawn {
                entity_id: r.get_u32()?,
            },
            TAG_SCOREBOARD => {
                let count = r.get_u16()? as usize;
                let mut rows = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    rows.push(ScoreRow {
                        peer_id: r.get_u32()?,
                        kills: r.get_u16()?,
                        deaths: r.get_u16()?,
                    });
                }
                Message::Scoreboard(rows)
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };

        if r.remaining() != 0 {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(message)
    }
}
