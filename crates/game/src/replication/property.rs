use glam::{Quat, Vec3};

use crate::net::{ByteReader, ByteWriter, DecodeError};

/// When a property is included in a snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Always,
    OnChange,
}

/// Per-entity dirty bitmask, one bit per property in fixed declaration order.
/// Capped at 8 properties per composite entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyMask(u8);

impl DirtyMask {
    pub fn set(&mut self, bit: u8, value: bool) {
        debug_assert!(bit < 8);
        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    pub fn is_set(&self, bit: u8) -> bool {
        debug_assert!(bit < 8);
        self.0 & (1 << bit) != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
}

/// Fixed-width value that can cross the wire.
pub trait WireValue: Copy + PartialEq {
    const SIZE: usize;
    fn put(&self, w: &mut ByteWriter);
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError>;
}

impl WireValue for u8 {
    const SIZE: usize = 1;
    fn put(&self, w: &mut ByteWriter) {
        w.put_u8(*self);
    }
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError> {
        r.get_u8()
    }
}

impl WireValue for u16 {
    const SIZE: usize = 2;
    fn put(&self, w: &mut ByteWriter) {
        w.put_u16(*self);
    }
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError> {
        r.get_u16()
    }
}

impl WireValue for u32 {
    const SIZE: usize = 4;
    fn put(&self, w: &mut ByteWriter) {
        w.put_u32(*self);
    }
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError> {
        r.get_u32()
    }
}

impl WireValue for f32 {
    const SIZE: usize = 4;
    fn put(&self, w: &mut ByteWriter) {
        w.put_f32(*self);
    }
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError> {
        r.get_f32()
    }
}

impl WireValue for Vec3 {
    const SIZE: usize = 12;
    fn put(&self, w: &mut ByteWriter) {
        w.put_vec3(*self);
    }
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError> {
        r.get_vec3()
    }
}

impl WireValue for Quat {
    const SIZE: usize = 16;
    fn put(&self, w: &mut ByteWriter) {
        w.put_quat(*self);
    }
    fn get(r: &mut ByteReader) -> Result<Self, DecodeError> {
        r.get_quat()
    }
}

/// Exact-comparison replicated field. The send cache is only updated by
/// `write`/`read`, so a property is never marked clean without actually
/// having been serialized. Every property starts dirty.
#[derive(Debug, Clone)]
pub struct Replicated<T: WireValue> {
    value: T,
    last_sent: T,
    mode: SyncMode,
    never_sent: bool,
}

impl<T: WireValue> Replicated<T> {
    pub fn new(value: T, mode: SyncMode) -> Self {
        Self {
            value,
            last_sent: value,
            mode,
            never_sent: true,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    pub fn has_changed(&self) -> bool {
        self.never_sent || self.value != self.last_sent
    }

    pub fn should_send(&self) -> bool {
        self.mode == SyncMode::Always || self.has_changed()
    }

    /// Forget the send cache so the next snapshot carries this field even if
    /// the value is unchanged.
    pub fn mark_dirty(&mut self) {
        self.never_sent = true;
    }

    pub fn size_bytes(&self) -> usize {
        T::SIZE
    }

    pub fn write(&mut self, w: &mut ByteWriter) {
        self.value.put(w);
        self.last_sent = self.value;
        self.never_sent = false;
    }

    pub fn read(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.value = T::get(r)?;
        self.last_sent = self.value;
        self.never_sent = false;
        Ok(())
    }
}

/// Vector field, dirty once the live value drifts farther than `threshold`
/// from the last-sent value.
#[derive(Debug, Clone)]
pub struct ReplicatedVec3 {
    value: Vec3,
    last_sent: Vec3,
    mode: SyncMode,
    threshold: f32,
    never_sent: bool,
}

impl ReplicatedVec3 {
    pub fn new(value: Vec3, mode: SyncMode, threshold: f32) -> Self {
        Self {
            value,
            last_sent: value,
            mode,
            threshold,
            never_sent: true,
        }
    }

    pub fn get(&self) -> Vec3 {
        self.value
    }

    pub fn set(&mut self, value: Vec3) {
        self.value = value;
    }

    pub fn has_changed(&self) -> bool {
        self.never_sent
            || self.value.distance_squared(self.last_sent) > self.threshold * self.threshold
    }

    pub fn should_send(&self) -> bool {
        self.mode == SyncMode::Always || self.has_changed()
    }

    pub fn mark_dirty(&mut self) {
        self.never_sent = true;
    }

    pub fn size_bytes(&self) -> usize {
        Vec3::SIZE
    }

    pub fn write(&mut self, w: &mut ByteWriter) {
        w.put_vec3(self.value);
        self.last_sent = self.value;
        self.never_sent = false;
    }

    pub fn read(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.value = r.get_vec3()?;
        self.last_sent = self.value;
        self.never_sent = false;
        Ok(())
    }
}

/// Position + rotation pair with independent thresholds.
#[derive(Debug, Clone)]
pub struct ReplicatedPose {
    position: Vec3,
    rotation: Quat,
    last_sent_position: Vec3,
    last_sent_rotation: Quat,
    mode: SyncMode,
    position_threshold: f32,
    rotation_threshold: f32,
    never_sent: bool,
}

impl ReplicatedPose {
    pub fn new(
        position: Vec3,
        rotation: Quat,
        mode: SyncMode,
        position_threshold: f32,
        rotation_threshold: f32,
    ) -> Self {
        Self {
            position,
            rotation,
            last_sent_position: position,
            last_sent_rotation: rotation,
            mode,
            position_threshold,
            rotation_threshold,
            never_sent: true,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }

    pub fn has_changed(&self) -> bool {
        self.never_sent
            || self.position.distance(self.last_sent_position) > self.position_threshold
            || self.rotation.angle_between(self.last_sent_rotation) > self.rotation_threshold
    }

    pub fn should_send(&self) -> bool {
        self.mode == SyncMode::Always || self.has_changed()
    }

    pub fn mark_dirty(&mut self) {
        self.never_sent = true;
    }

    pub fn size_bytes(&self) -> usize {
        Vec3::SIZE + Quat::SIZE
    }

    pub fn write(&mut self, w: &mut ByteWriter) {
        w.put_vec3(self.position);
        w.put_quat(self.rotation);
        self.last_sent_position = self.position;
        self.last_sent_rotation = self.rotation;
        self.never_sent = false;
    }

    pub fn read(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.position = r.get_vec3()?;
        self.rotation = r.get_quat()?.normalize();
        self.last_sent_position = self.position;
        self.last_sent_rotation = self.rotation;
        self.never_sent = false;
        Ok(())
    }
}

/// Linear + angular velocity pair sharing one mask bit.
#[derive(Debug, Clone)]
pub struct ReplicatedMotion {
    linear: Vec3,
    angular: Vec3,
    last_sent_linear: Vec3,
    last_sent_angular: Vec3,
    mode: SyncMode,
    threshold: f32,
    never_sent: bool,
}

impl ReplicatedMotion {
    pub fn new(mode: SyncMode, threshold: f32) -> Self {
        Self {
            linear: Vec3::ZERO,
            angular: Vec3::ZERO,
            last_sent_linear: Vec3::ZERO,
            last_sent_angular: Vec3::ZERO,
            mode,
            threshold,
            never_sent: true,
        }
    }

    pub fn linear(&self) -> Vec3 {
        self.linear
    }

    pub fn angular(&self) -> Vec3 {
        self.angular
    }

    pub fn set(&mut self, linear: Vec3, angular: Vec3) {
        self.linear = linear;
        self.angular = angular;
    }

    pub fn has_changed(&self) -> bool {
        let t2 = self.threshold * self.threshold;
        self.never_sent
            || self.linear.distance_squared(self.last_sent_linear) > t2
            || self.angular.distance_squared(self.last_sent_angular) > t2
    }

    pub fn should_send(&self) -> bool {
        self.mode == SyncMode::Always || self.has_changed()
    }

    pub fn mark_dirty(&mut self) {
        self.never_sent = true;
    }

    pub fn size_bytes(&self) -> usize {
        Vec3::SIZE * 2
    }

    pub fn write(&mut self, w: &mut ByteWriter) {
        w.put_vec3(self.linear);
        w.put_vec3(self.angular);
        self.last_sent_linear = self.linear;
        self.last_sent_angular = self.angular;
        self.never_sent = false;
    }

    pub fn read(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.linear = r.get_vec3()?;
        self.angular = r.get_vec3()?;
        self.last_sent_linear = self.linear;
        self.last_sent_angular = self.angular;
        self.never_sent = false;
        Ok(())
    }
}

/// Yaw/pitch aim angles sharing one mask bit, dirty past an angle threshold.
#[derive(Debug, Clone)]
pub struct ReplicatedAngles {
    yaw: f32,
    pitch: f32,
    last_sent_yaw: f32,
    last_sent_pitch: f32,
    mode: SyncMode,
    threshold: f32,
    never_sent: bool,
}

impl ReplicatedAngles {
    pub fn new(mode: SyncMode, threshold: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            last_sent_yaw: 0.0,
            last_sent_pitch: 0.0,
            mode,
            threshold,
            never_sent: true,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
    }

    pub fn has_changed(&self) -> bool {
        self.never_sent
            || (self.yaw - self.last_sent_yaw).abs() > self.threshold
            || (self.pitch - self.last_sent_pitch).abs() > self.threshold
    }

    pub fn should_send(&self) -> bool {
        self.mode == SyncMode::Always || self.has_changed()
    }

    pub fn mark_dirty(&mut self) {
        self.never_sent = true;
    }

    pub fn size_bytes(&self) -> usize {
        8
    }

    pub fn write(&mut self, w: &mut ByteWriter) {
        w.put_f32(self.yaw);
        w.put_f32(self.pitch);
        self.last_sent_yaw = self.yaw;
        self.last_sent_pitch = self.pitch;
        self.never_sent = false;
    }

    pub fn read(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.yaw = r.get_f32()?;
        self.pitch = r.get_f32()?;
        self.last_sent_yaw = self.yaw;
        self.last_sent_pitch = self.pitch;
        self.never_sent = false;
        Ok(())
    }
}

/// Short replicated string (mode names). Exact comparison, u16 length prefix.
#[derive(Debug, Clone)]
pub struct ReplicatedString {
    value: String,
    last_sent: String,
    mode: SyncMode,
    never_sent: bool,
}

impl ReplicatedString {
    pub fn new(value: impl Into<String>, mode: SyncMode) -> Self {
        let value = value.into();
        Self {
            last_sent: value.clone(),
            value,
            mode,
            never_sent: true,
        }
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn has_changed(&self) -> bool {
        self.never_sent || self.value != self.last_sent
    }

    pub fn should_send(&self) -> bool {
        self.mode == SyncMode::Always || self.has_changed()
    }

    pub fn mark_dirty(&mut self) {
        self.never_sent = true;
    }

    pub fn size_bytes(&self) -> usize {
        2 + self.value.len()
    }

    pub fn write(&mut self, w: &mut ByteWriter) {
        w.put_str(&self.value);
        self.last_sent = self.value.clone();
        self.never_sent = false;
    }

    pub fn read(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        self.value = r.get_str()?;
        self.last_sent = self.value.clone();
        self.never_sent = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_change_scalar_dirty_tracking() {
        let mut health = Replicated::new(100u16, SyncMode::OnChange);
        // Never sent: dirty from birth so the first snapshot is complete.
        assert!(health.has_changed());

        let mut w = ByteWriter::new();
        health.write(&mut w);
        assert!(!health.has_changed());
        assert!(!health.should_send());
        assert_eq!(w.len(), health.size_bytes());

        health.set(100);
        assert!(!health.has_changed());
        health.set(85);
        assert!(health.has_changed());
        assert!(health.should_send());
    }

    #[test]
    fn always_mode_sends_when_clean() {
        let mut pos = ReplicatedVec3::new(Vec3::ZERO, SyncMode::Always, 0.0);
        let mut w = ByteWriter::new();
        pos.write(&mut w);
        assert!(!pos.has_changed());
        assert!(pos.should_send());
    }

    #[test]
    fn vec3_threshold_gates_dirtiness() {
        let mut vel = ReplicatedVec3::new(Vec3::ZERO, SyncMode::OnChange, 0.1);
        let mut w = ByteWriter::new();
        vel.write(&mut w);

        vel.set(Vec3::new(0.05, 0.0, 0.0));
        assert!(!vel.has_changed());
        vel.set(Vec3::new(0.2, 0.0, 0.0));
        assert!(vel.has_changed());
    }

    #[test]
    fn pose_dirty_on_position_or_rotation() {
        let mut pose = ReplicatedPose::new(
            Vec3::ZERO,
            Quat::IDENTITY,
            SyncMode::OnChange,
            0.01,
            0.005,
        );
        let mut w = ByteWriter::new();
        pose.write(&mut w);
        assert!(!pose.has_changed());

        pose.set(Vec3::new(0.5, 0.0, 0.0), Quat::IDENTITY);
        assert!(pose.has_changed());

        let mut w = ByteWriter::new();
        pose.write(&mut w);
        assert!(!pose.has_changed());

        pose.set(pose.position(), Quat::from_rotation_y(0.1));
        assert!(pose.has_changed());
    }

    #[test]
    fn write_then_read_keeps_cache_equal_to_transmitted() {
        let mut source = ReplicatedPose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.7),
            SyncMode::OnChange,
            0.01,
            0.005,
        );
        let mut w = ByteWriter::new();
        source.write(&mut w);

        let bytes = w.into_vec();
        let mut sink = ReplicatedPose::new(
            Vec3::ZERO,
            Quat::IDENTITY,
            SyncMode::OnChange,
            0.01,
            0.005,
        );
        let mut r = ByteReader::new(&bytes);
        sink.read(&mut r).unwrap();

        assert!(sink.position().distance(source.position()) < 1e-6);
        assert!(!sink.has_changed());
    }

    #[test]
    fn string_exact_compare() {
        let mut mode = ReplicatedString::new("ffa", SyncMode::OnChange);
        let mut w = ByteWriter::new();
        mode.write(&mut w);
        assert!(!mode.has_changed());

        mode.set("ctf");
        assert!(mode.has_changed());
        assert_eq!(mode.size_bytes(), 2 + 3);

        let mut w = ByteWriter::new();
        mode.write(&mut w);
        assert!(!mode.has_changed());
    }

    #[test]
    fn mark_dirty_forces_resend_of_unchanged_value() {
        let mut mode = ReplicatedString::new("koth", SyncMode::OnChange);
        let mut w = ByteWriter::new();
        mode.write(&mut w);
        assert!(!mode.should_send());

        mode.mark_dirty();
        assert!(mode.should_send());

        let mut w = ByteWriter::new();
        mode.write(&mut w);
        assert_eq!(w.len(), 2 + 4);
        assert!(!mode.should_send());
    }

    #[test]
    fn dirty_mask_bits() {
        let mut mask = DirtyMask::default();
        mask.set(0, true);
        mask.set(3, true);
        mask.set(3, false);
        mask.set(5, true);
        assert!(mask.is_set(0));
        assert!(!mask.is_set(3));
        assert!(mask.is_set(5));
        assert_eq!(mask.bits(), 0b0010_0001);
        assert_eq!(DirtyMask::from_bits(mask.bits()), mask);
    }
}
