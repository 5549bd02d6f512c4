use crate::ids::MATCH_STATE_ID;
use crate::net::{ByteReader, ByteWriter, DecodeError};
use crate::replication::{DirtyMask, Replicated, ReplicatedString, SyncMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MatchPhase {
    #[default]
    Warmup = 0,
    Active = 1,
    RoundEnd = 2,
}

impl From<u8> for MatchPhase {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Active,
            2 => Self::RoundEnd,
            _ => Self::Warmup,
        }
    }
}

/// The singleton match/round entity at `MATCH_STATE_ID`. The round clock is
/// replicated every tick; phase and mode name only on change.
///
/// Snapshot payload: mask:u8, bits: 0 roundTimeLeft:f32 (Always),
/// 1 phase:u8, 2 modeName:u16-prefixed utf-8 (OnChange).
#[derive(Debug, Clone)]
pub struct MatchState {
    round_time_left: Replicated<f32>,
    phase: Replicated<u8>,
    mode_name: ReplicatedString,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new("deathmatch", 300.0)
    }
}

impl MatchState {
    pub fn new(mode_name: &str, round_seconds: f32) -> Self {
        Self {
            round_time_left: Replicated::new(round_seconds, SyncMode::Always),
            phase: Replicated::new(MatchPhase::Warmup as u8, SyncMode::OnChange),
            mode_name: ReplicatedString::new(mode_name, SyncMode::OnChange),
        }
    }

    pub fn id(&self) -> u32 {
        MATCH_STATE_ID
    }

    pub fn round_time_left(&self) -> f32 {
        self.round_time_left.get()
    }

    pub fn phase(&self) -> MatchPhase {
        MatchPhase::from(self.phase.get())
    }

    pub fn set_phase(&mut self, phase: MatchPhase) {
        self.phase.set(phase as u8);
    }

    pub fn mode_name(&self) -> &str {
        self.mode_name.get()
    }

    pub fn set_mode_name(&mut self, name: &str) {
        self.mode_name.set(name);
    }

    pub fn tick(&mut self, dt: f32) {
        let remaining = (self.round_time_left.get() - dt).max(0.0);
        self.round_time_left.set(remaining);
        if remaining == 0.0 && self.phase() == MatchPhase::Active {
            self.set_phase(MatchPhase::RoundEnd);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.round_time_left.mark_dirty();
        self.phase.mark_dirty();
        self.mode_name.mark_dirty();
    }

    pub fn write_snapshot(&mut self, w: &mut ByteWriter) {
        let mut mask = DirtyMask::default();
        mask.set(0, self.round_time_left.should_send());
        mask.set(1, self.phase.should_send());
        mask.set(2, self.mode_name.should_send());
        w.put_u8(mask.bits());

        if mask.is_set(0) {
            self.round_time_left.write(w);
        }
        if mask.is_set(1) {
            self.phase.write(w);
        }
        if mask.is_set(2) {
            self.mode_name.write(w);
        }
    }

    pub fn apply_snapshot(&mut self, r: &mut ByteReader) -> Result<(), DecodeError> {
        let mask = DirtyMask::from_bits(r.get_u8()?);
        if mask.is_set(0) {
            self.round_time_left.read(r)?;
        }
        if mask.is_set(1) {
            self.phase.read(r)?;
        }
        if mask.is_set(2) {
            self.mode_name.read(r)?;
        }
        Ok(())
    }

    pub fn snapshot_size_hint(&self) -> usize {
        1 + self.round_time_left.size_bytes()
            + self.phase.size_bytes()
            + self.mode_name.size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_runs_down_and_round_ends() {
        let mut state = MatchState::new("koth", 1.0);
        state.set_phase(MatchPhase::Active);
        for _ in 0..40 {
            state.tick(1.0 / 30.0);
        }
        assert_eq!(state.round_time_left(), 0.0);
        assert_eq!(state.phase(), MatchPhase::RoundEnd);
    }

    #[test]
    fn mode_name_replicates_on_change_only() {
        let mut server_side = MatchState::new("koth", 300.0);
        let mut proxy = MatchState::new("deathmatch", 0.0);

        let mut w = ByteWriter::new();
        server_side.write_snapshot(&mut w);
        proxy
            .apply_snapshot(&mut ByteReader::new(&w.into_vec()))
            .unwrap();
        assert_eq!(proxy.mode_name(), "koth");

        // Second write with no change omits the string.
        server_side.tick(1.0 / 30.0);
        let mut w = ByteWriter::new();
        server_side.write_snapshot(&mut w);
        let bytes = w.into_vec();
        assert_eq!(bytes.len(), 1 + 4);
        proxy.apply_snapshot(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(proxy.mode_name(), "koth");
        assert!((proxy.round_time_left() - (300.0 - 1.0 / 30.0)).abs() < 1e-4);
    }
}
