use bitflags::bitflags;
use glam::Vec3;

use crate::config::CharacterTuning;
use crate::net::{ByteReader, ByteWriter, CharacterInput, DecodeError};
use crate::replication::{
    DirtyMask, Replicated, ReplicatedAngles, ReplicatedVec3, SyncMode,
};

const VIEW_ANGLE_THRESHOLD: f32 = 0.001;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CharacterFlags: u8 {
        const SPRINTING = 1 << 0;
        const AIRBORNE = 1 << 1;
        const IN_VEHICLE = 1 << 2;
        const FIRING = 1 << 3;
    }
}

/// An on-foot player character. The same struct serves as the server's
/// authoritative copy, the client's predicted entity and the remote proxy.
///
/// Snapshot payload: lastInputTick:u32, mask:u8, then by mask bit:
/// 0 position, 1 velocity (both Always), 2 view yaw+pitch, 3 health, 4 ammo,
/// 5 flags (OnChange).
#[derive(Debug, Clone)]
pub struct Character {
    id: u32,
    /// Foot-input tick the state was last simulated from. Clients key their
    /// prediction-history lookup on this.
    pub last_input_tick: u32,
    position: ReplicatedVec3,
    velocity: ReplicatedVec3,
    view: ReplicatedAngles,
    health: Replicated<u16>,
    ammo: Replicated<u16>,
    flags: Replicated<u8>,
    grounded: bool,
}

impl Character {
    pub fn new(id: u32, spawn_position: Vec3) -> Self {
        Self {
            id,
            last_input_tick: 0,
            position: ReplicatedVec3::new(spawn_position, SyncMode::Always, 0.0),
            velocity: ReplicatedVec3::new(Vec3::ZERO, SyncMode::Always, 0.0),
            view: ReplicatedAngles::new(SyncMode::OnChange, VIEW_ANGLE_THRESHOLD),
            health: Replicated::new(100, SyncMode::OnChange),
            ammo: Replicated::new(CharacterTuning::default().magazine_size, SyncMode::OnChange),
            flags: Replicated::new(0, SyncMode::OnChange),
            grounded: true,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn position(&self) -> Vec3 {
        self.position.get()
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position.set(position);
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity.get()
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity.set(velocity);
    }

    pub fn yaw(&self) -> f32 {
        self.view.yaw()
    }

    pub fn pitch(&self) -> f32 {
        self.view.pitch()
    }

    pub fn health(&self) -> u16 {
        self.health.get()
    }

    pub fn ammo(&self) -> u16 {
        self.ammo.get()
    }

    pub fn flags(&self) -> CharacterFlags {
        CharacterFlags::from_bits_truncate(self.flags.get())
    }

    pub fn set_flag(&mut self, flag: CharacterFlags, value: bool) {
        let mut flags = self.flags();
        flags.set(flag, value);
        self.flags.set(flags.bits());
    }

    pub fn in_vehicle(&self) -> bool {
        self.flags().contains(CharacterFlags::IN_VEHICLE)
    }

    /// Advance one fixed step. Runs identically on the server and on the
    /// owning client; the ground plane at y = 0 stands in for the external
    /// collision engine.
    pub fn simulate(&mut self, input: &CharacterInput, tuning: &CharacterTuning, dt: f32) {
        self.last_input_tick = input.tick;
        self.view.set(input.view_yaw, input.view_pitch);

        if self.in_vehicle() {
            // Driving: the body is parked and hidden; no movement integration.
            return;
        }

        let (sin_yaw, cos_yaw) = input.view_yaw.sin_cos();
        let forward = Vec3::new(sin_yaw, 0.0, cos_yaw);
        let right = Vec3::new(cos_yaw, 0.0, -sin_yaw);

        let mut wish = right * input.move_x + forward * input.move_y;
        if wish.length_squared() > 1.0 {
            wish = wish.normalize();
        }

        let speed = if input.sprint {
            tuning.walk_speed * tuning.sprint_multiplier
        } else {
            tuning.walk_speed
        };

        let mut velocity = self.velocity.get();
        velocity.x = wish.x * speed;
        velocity.z = wish.z * speed;

        if self.grounded && input.jump {
            velocity.y = tuning.jump_speed;
            self.grounded = false;
        }
        velocity.y -= tuning.gravity * dt;

        let mut position = self.position.get() + velocity * dt;
        if position.y <= 0.0 {
            position.y = 0.0;
            velocity.y = 0.0;
            self.grounded = true;
        }

        self.position.set(position);
        self.velocity.set(velocity);

        if input.reload {
            self.ammo.set(tuning.magazine_size);
        } else if input.primary_fire_just_pressed && self.ammo.get() > 0 {
            self.ammo.set(self.ammo.get() - 1);
        }

        let mut flags = self.flags();
        flags.set(CharacterFlags::SPRINTING, input.sprint && wish != Vec3::ZERO);
        flags.set(CharacterFlags::AIRBORNE, !self.grounded);
        flags.set(CharacterFlags::FIRING, input.primary_fire);
        self.flags.set(flags.bits());
    }

    pub fn mark_all_dirty(&mut self) {
        self.position.mark_dirty();
        self.velocity.mark_dirty();
        self.view.mark_dirty();
        self.health.mark_dirty();
        self.ammo.mark_dirty();
        self.flags.mark_dirty();
    }

    pub fn write_snapshot(&mut self, w: &mut ByteWriter) {
        w.put_u32(self.last_input_tick);

        let mut mask = DirtyMask::default();
        mask.set(0, self.position.should_send());
        mask.set(1, self.velocity.should_send());
        mask.set(2, self.view.should_send());
        mask.set(3, self.health.should_send());
        mask.set(4, self.ammo.should_send());
        mask.set(5, self.flags.should_send());
        w.put_u8(mask.bits());

        if mask.is_set(0) {
            self.position.write(w);
        }
        if mask.is_set(1) {
            self.velocity.write(w);
        }
        if mask.is_set(2) {
            self.view.write(w);
        }
        if mask.is_set(3) {
            self.health.write(w);
        }
        if mask.is_set(4) {
            self.ammo.write(w);
        }
        if mask.is_set(5) {
            self.flags.write(w);
        }
    }

    pub fn apply_snapshot(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.last_input_tick = r.get_u32()?;
        let mask = DirtyMask::from_bits(r.get_u8()?);

        if mask.is_set(0) {
            self.position.read(r)?;
        }
        if mask.is_set(1) {
            self.velocity.read(r)?;
        }
        if mask.is_set(2) {
            self.view.read(r)?;
        }
        if mask.is_set(3) {
            self.health.read(r)?;
        }
        if mask.is_set(4) {
            self.ammo.read(r)?;
        }
        if mask.is_set(5) {
            self.flags.read(r)?;
        }
        Ok(())
    }

    pub fn snapshot_size_hint(&self) -> usize {
        4 + 1
            + self.position.size_bytes()
            + self.velocity.size_bytes()
            + self.view.size_bytes()
            + self.health.size_bytes()
            + self.ammo.size_bytes()
            + self.flags.size_bytes()
    }
}
