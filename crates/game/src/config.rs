use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconciliation and convergence tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Prediction errors strictly greater than this hard-snap; an error equal
    /// to the threshold still blends.
    pub snap_distance: f32,
    /// Fraction of the remaining error corrected per tick for small errors.
    pub correction_fraction: f32,
    /// Per-physics-step blend factor for a pending vehicle snapshot.
    pub blend_factor: f32,
    pub position_epsilon: f32,
    /// Radians.
    pub rotation_epsilon: f32,
    pub linear_velocity_epsilon: f32,
    pub angular_velocity_epsilon: f32,
    pub history_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            snap_distance: 3.0,
            correction_fraction: 0.1,
            blend_factor: 0.35,
            position_epsilon: 0.05,
            rotation_epsilon: 0.01,
            linear_velocity_epsilon: 0.1,
            angular_velocity_epsilon: 0.1,
            history_capacity: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterTuning {
    pub walk_speed: f32,
    pub sprint_multiplier: f32,
    pub jump_speed: f32,
    pub gravity: f32,
    pub magazine_size: u16,
}

impl Default for CharacterTuning {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            sprint_multiplier: 1.6,
            jump_speed: 6.0,
            gravity: 20.0,
            magazine_size: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleTuning {
    pub engine_accel: f32,
    pub max_speed: f32,
    pub steer_rate: f32,
    pub brake_decel: f32,
    pub handbrake_decel: f32,
    pub drag: f32,
    /// A character must be within this distance to enter a vehicle.
    pub enter_radius: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            engine_accel: 12.0,
            max_speed: 30.0,
            steer_rate: 1.8,
            brake_decel: 18.0,
            handbrake_decel: 10.0,
            drag: 0.6,
            enter_radius: 4.0,
        }
    }
}

/// Session-level constants shared by both roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub tick_rate: u32,
    #[serde(with = "duration_secs")]
    pub peer_timeout: Duration,
    /// Scoreboard broadcast period, in ticks. 0 disables the broadcast.
    pub scoreboard_interval: u32,
    /// Full-state refresh period, in ticks, so a lost on-change transition
    /// heals without waiting for the next change. 0 disables the refresh.
    pub full_snapshot_interval: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::net::DEFAULT_TICK_RATE,
            peer_timeout: Duration::from_secs(5),
            scoreboard_interval: 30,
            full_snapshot_interval: 60,
        }
    }
}

impl SessionConfig {
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs_f64(f64::deserialize(d)?))
    }
}
