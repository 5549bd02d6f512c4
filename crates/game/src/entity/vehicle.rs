use bitflags::bitflags;
use glam::{Quat, Vec3};

use crate::config::{ReconcileConfig, VehicleTuning};
use crate::net::{ByteReader, ByteWriter, DecodeError, VehicleInput};
use crate::replication::{
    DirtyMask, Replicated, ReplicatedMotion, ReplicatedPose, SyncMode,
};

const POSE_POSITION_THRESHOLD: f32 = 0.01;
const POSE_ROTATION_THRESHOLD: f32 = 0.005;
const MOTION_THRESHOLD: f32 = 0.05;

/// Occupant value meaning "nobody is driving".
pub const NO_OCCUPANT: u32 = 0;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VehicleFlags: u8 {
        const HANDBRAKE = 1 << 0;
        const BRAKING = 1 << 1;
    }
}

/// Authoritative pose/velocity target decoded from a server snapshot, blended
/// into the live body over several physics steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// Fields decoded from a vehicle snapshot payload. Omitted pose/motion fields
/// resolve to the receiver's current values.
#[derive(Debug, Clone, Copy)]
pub struct VehicleSnapshot {
    pub last_input_tick: u32,
    pub target: PendingPose,
    pub occupant: Option<u32>,
    pub flags: Option<VehicleFlags>,
}

/// A drivable vehicle. The server owns the authoritative copy; the driving
/// client simulates its own and converges it toward late-arriving server
/// targets instead of teleporting.
///
/// Snapshot payload: lastInputTick:u32, mask:u8, bits: 0 pose, 1 velocities,
/// 2 occupant peer ID, 3 flags (all OnChange, pose/motion with thresholds).
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: u32,
    pub last_input_tick: u32,
    pose: ReplicatedPose,
    motion: ReplicatedMotion,
    occupant: Replicated<u32>,
    flags: Replicated<u8>,
    spawn_position: Vec3,
    spawn_rotation: Quat,
    pending: Option<PendingPose>,
}

impl Vehicle {
    pub fn new(id: u32, spawn_position: Vec3, spawn_rotation: Quat) -> Self {
        Self {
            id,
            last_input_tick: 0,
            pose: ReplicatedPose::new(
                spawn_position,
                spawn_rotation,
                SyncMode::OnChange,
                POSE_POSITION_THRESHOLD,
                POSE_ROTATION_THRESHOLD,
            ),
            motion: ReplicatedMotion::new(SyncMode::OnChange, MOTION_THRESHOLD),
            occupant: Replicated::new(NO_OCCUPANT, SyncMode::OnChange),
            flags: Replicated::new(0, SyncMode::OnChange),
            spawn_position,
            spawn_rotation,
            pending: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position()
    }

    pub fn rotation(&self) -> Quat {
        self.pose.rotation()
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.motion.linear()
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.motion.angular()
    }

    pub fn occupant(&self) -> Option<u32> {
        match self.occupant.get() {
            NO_OCCUPANT => None,
            peer_id => Some(peer_id),
        }
    }

    pub fn set_occupant(&mut self, peer_id: Option<u32>) {
        self.occupant.set(peer_id.unwrap_or(NO_OCCUPANT));
    }

    pub fn flags(&self) -> VehicleFlags {
        VehicleFlags::from_bits_truncate(self.flags.get())
    }

    pub fn has_pending_target(&self) -> bool {
        self.pending.is_some()
    }

    pub fn respawn(&mut self) {
        self.pose.set(self.spawn_position, self.spawn_rotation);
        self.motion.set(Vec3::ZERO, Vec3::ZERO);
        self.pending = None;
    }

    /// Advance one fixed step under driver input. Deterministic, shared by
    /// the server and the predicting driver.
    pub fn simulate(&mut self, input: &VehicleInput, tuning: &VehicleTuning, dt: f32) {
        self.last_input_tick = input.tick;

        if input.respawn_requested {
            self.respawn();
            return;
        }

        let rotation = self.pose.rotation();
        let forward = rotation * Vec3::Z;
        let mut velocity = self.motion.linear();
        let mut speed = velocity.dot(forward);

        speed += input.throttle.clamp(-1.0, 1.0) * tuning.engine_accel * dt;
        if input.brake {
            speed = approach_zero(speed, tuning.brake_decel * dt);
        }
        if input.handbrake {
            speed = approach_zero(speed, tuning.handbrake_decel * dt);
        }
        speed = approach_zero(speed, tuning.drag * dt);
        speed = speed.clamp(-tuning.max_speed * 0.5, tuning.max_speed);

        // Steering authority scales with speed so a parked car cannot pivot.
        let steer_authority = (speed.abs() / tuning.max_speed).clamp(0.0, 1.0);
        let yaw_rate =
            -input.steer.clamp(-1.0, 1.0) * tuning.steer_rate * steer_authority * speed.signum();

        let rotation = (Quat::from_rotation_y(yaw_rate * dt) * rotation).normalize();
        let forward = rotation * Vec3::Z;

        // Kinematic grip: velocity follows the chassis unless the handbrake
        // lets the rear slide.
        if input.handbrake {
            let slide = velocity - forward * velocity.dot(forward);
            velocity = forward * speed + slide * 0.9;
        } else {
            velocity = forward * speed;
        }
        velocity.y = 0.0;

        let mut position = self.pose.position() + velocity * dt;
        position.y = 0.0;

        self.pose.set(position, rotation);
        self.motion.set(velocity, Vec3::new(0.0, yaw_rate, 0.0));

        let mut flags = VehicleFlags::empty();
        flags.set(VehicleFlags::HANDBRAKE, input.handbrake);
        flags.set(VehicleFlags::BRAKING, input.brake);
        self.flags.set(flags.bits());
    }

    pub fn simulate_idle(&mut self, tuning: &VehicleTuning, dt: f32) {
        let mut velocity = self.motion.linear();
        if velocity == Vec3::ZERO {
            return;
        }
        let decel = (tuning.brake_decel * 0.5) * dt;
        let length = velocity.length();
        velocity = if length <= decel {
            Vec3::ZERO
        } else {
            velocity * ((length - decel) / length)
        };
        let position = self.pose.position() + velocity * dt;
        self.pose.set(position, self.pose.rotation());
        self.motion.set(velocity, Vec3::ZERO);
    }

    /// Accept an authoritative snapshot for a locally-simulated vehicle.
    /// Divergence strictly beyond the snap distance hard-applies; anything
    /// else, including an error exactly at the threshold, becomes a pending
    /// target for the per-step convergence blend.
    pub fn receive_authoritative(&mut self, snapshot: &VehicleSnapshot, cfg: &ReconcileConfig) {
        self.last_input_tick = snapshot.last_input_tick;
        if let Some(occupant) = snapshot.occupant {
            self.occupant.set(occupant);
        }
        if let Some(flags) = snapshot.flags {
            self.flags.set(flags.bits());
        }

        let target = snapshot.target;
        let error = self.pose.position().distance(target.position);
        if error > cfg.snap_distance {
            self.pose.set(target.position, target.rotation);
            self.motion
                .set(target.linear_velocity, target.angular_velocity);
            self.pending = None;
        } else {
            self.pending = Some(target);
        }
    }

    /// One convergence step: blend the live body toward the pending target.
    /// The target is dropped once position, rotation and both velocity errors
    /// are all under their epsilons at the same time.
    pub fn converge(&mut self, cfg: &ReconcileConfig) {
        let Some(target) = self.pending else {
            return;
        };

        let t = cfg.blend_factor;
        let position = self.pose.position().lerp(target.position, t);
        let rotation = self.pose.rotation().slerp(target.rotation, t).normalize();
        let linear = self.motion.linear().lerp(target.linear_velocity, t);
        let angular = self.motion.angular().lerp(target.angular_velocity, t);

        self.pose.set(position, rotation);
        self.motion.set(linear, angular);

        let done = position.distance(target.position) < cfg.position_epsilon
            && rotation.angle_between(target.rotation) < cfg.rotation_epsilon
            && linear.distance(target.linear_velocity) < cfg.linear_velocity_epsilon
            && angular.distance(target.angular_velocity) < cfg.angular_velocity_epsilon;
        if done {
            self.pending = None;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.pose.mark_dirty();
        self.motion.mark_dirty();
        self.occupant.mark_dirty();
        self.flags.mark_dirty();
    }

    pub fn write_snapshot(&mut self, w: &mut ByteWriter) {
        w.put_u32(self.last_input_tick);

        let mut mask = DirtyMask::default();
        mask.set(0, self.pose.should_send());
        mask.set(1, self.motion.should_send());
        mask.set(2, self.occupant.should_send());
        mask.set(3, self.flags.should_send());
        w.put_u8(mask.bits());

        if mask.is_set(0) {
            self.pose.write(w);
        }
        if mask.is_set(1) {
            self.motion.write(w);
        }
        if mask.is_set(2) {
            self.occupant.write(w);
        }
        if mask.is_set(3) {
            self.flags.write(w);
        }
    }

    pub fn apply_snapshot(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.last_input_tick = r.get_u32()?;
        let mask = DirtyMask::from_bits(r.get_u8()?);

        if mask.is_set(0) {
            self.pose.read(r)?;
        }
        if mask.is_set(1) {
            self.motion.read(r)?;
        }
        if mask.is_set(2) {
            self.occupant.read(r)?;
        }
        if mask.is_set(3) {
            self.flags.read(r)?;
        }
        Ok(())
    }

    /// Decode a snapshot payload without touching live state, resolving
    /// omitted fields against the current body.
    pub fn decode_snapshot(&self, data: &[u8]) -> Result<VehicleSnapshot, DecodeError> {
        let mut r = ByteReader::new(data);
        let last_input_tick = r.get_u32()?;
        let mask = DirtyMask::from_bits(r.get_u8()?);

        let mut target = PendingPose {
            position: self.pose.position(),
            rotation: self.pose.rotation(),
            linear_velocity: self.motion.linear(),
            angular_velocity: self.motion.angular(),
        };
        if mask.is_set(0) {
            target.position = r.get_vec3()?;
            target.rotation = r.get_quat()?.normalize();
        }
        if mask.is_set(1) {
            target.linear_velocity = r.get_vec3()?;
            target.angular_velocity = r.get_vec3()?;
        }
        let occupant = if mask.is_set(2) {
            Some(r.get_u32()?)
        } else {
            None
        };
        let flags = if mask.is_set(3) {
            Some(VehicleFlags::from_bits_truncate(r.get_u8()?))
        } else {
            None
        };

        Ok(VehicleSnapshot {
            last_input_tick,
            target,
            occupant,
            flags,
        })
    }

    pub fn snapshot_size_hint(&self) -> usize {
        4 + 1
            + self.pose.size_bytes()
            + self.motion.size_bytes()
            + self.occupant.size_bytes()
            + self.flags.size_bytes()
    }
}

fn approach_zero(value: f32, amount: f32) -> f32 {
    if value.abs() <= amount {
        0.0
    } else {
        value - amount * value.signum()
    }
}
