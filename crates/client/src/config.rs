use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use skirmish::{CharacterTuning, ReconcileConfig, VehicleTuning};

/// Client-side tuning. The character/vehicle tables must match the server's
/// or prediction diverges every tick and reconciliation does all the work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub tick_rate: u32,
    pub reconcile: ReconcileConfig,
    pub character: CharacterTuning,
    pub vehicle: VehicleTuning,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], skirmish::DEFAULT_PORT)),
            tick_rate: skirmish::DEFAULT_TICK_RATE,
            reconcile: ReconcileConfig::default(),
            character: CharacterTuning::default(),
            vehicle: VehicleTuning::default(),
        }
    }
}
