use std::collections::VecDeque;

use glam::Vec3;

use skirmish::ReconcileConfig;
use skirmish::entity::Character;

/// The predicted result of one local input, kept so a later authoritative
/// snapshot tagged with the same tick can be checked against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionSample {
    pub tick: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
}

/// What a reconciliation pass did, mostly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Snapshot tick already processed; duplicates and stragglers are no-ops.
    Stale,
    /// No sample left for that tick: authoritative state wins outright.
    HardApplied,
    Snapped,
    Blended,
}

/// Compares authoritative character snapshots against the local prediction
/// history and corrects the live predicted entity. The history is
/// tick-ordered; the matching scan walks forward and discards everything
/// older than the snapshot on the way.
pub struct ReconciliationController {
    history: VecDeque<PredictionSample>,
    last_reconciled: Option<u32>,
    config: ReconcileConfig,
}

impl ReconciliationController {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            last_reconciled: None,
            config,
        }
    }

    pub fn record(&mut self, sample: PredictionSample) {
        while self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn take_matching(&mut self, tick: u32) -> Option<PredictionSample> {
        while let Some(front) = self.history.front() {
            if front.tick < tick {
                self.history.pop_front();
            } else if front.tick == tick {
                return self.history.pop_front();
            } else {
                return None;
            }
        }
        None
    }

    /// Fold an authoritative snapshot (already applied to `authoritative`, a
    /// persistent shadow copy) into the live predicted character. Snapshot
    /// ticks are consumed monotonically, so a late duplicate can never
    /// re-correct the entity a second time.
    pub fn reconcile(
        &mut self,
        predicted: &mut Character,
        authoritative: &Character,
    ) -> Correction {
        let tick = authoritative.last_input_tick;
        if self.last_reconciled.is_some_and(|last| tick <= last) {
            return Correction::Stale;
        }
        self.last_reconciled = Some(tick);

        let Some(sample) = self.take_matching(tick) else {
            hard_apply(predicted, authoritative);
            self.history.clear();
            return Correction::HardApplied;
        };

        let error = authoritative.position() - sample.position;
        if error.length() > self.config.snap_distance {
            hard_apply(predicted, authoritative);
            self.history.clear();
            return Correction::Snapped;
        }

        // Ordinary jitter: spread the correction over several frames.
        let t = self.config.correction_fraction;
        let velocity_error = authoritative.velocity() - sample.velocity;
        predicted.set_position(predicted.position() + error * t);
        predicted.set_velocity(predicted.velocity() + velocity_error * t);
        Correction::Blended
    }
}

fn hard_apply(predicted: &mut Character, authoritative: &Character) {
    predicted.set_position(authoritative.position());
    predicted.set_velocity(authoritative.velocity());
}
