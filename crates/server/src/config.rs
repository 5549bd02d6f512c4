use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use skirmish::{CharacterTuning, DEFAULT_PORT, SessionConfig, VehicleTuning};

/// Everything the server needs to run a session, CLI-overridable in `main`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub max_peers: usize,
    /// Vehicles spawned into the world at startup.
    pub vehicle_count: u32,
    pub mode_name: String,
    pub round_seconds: f32,
    pub session: SessionConfig,
    pub character: CharacterTuning,
    pub vehicle: VehicleTuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_peers: 16,
            vehicle_count: 4,
            mode_name: "deathmatch".to_string(),
            round_seconds: 300.0,
            session: SessionConfig::default(),
            character: CharacterTuning::default(),
            vehicle: VehicleTuning::default(),
        }
    }
}
