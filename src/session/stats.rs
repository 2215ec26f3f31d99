//! Per-faction turn statistics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::actions::ChangeRecord;
use crate::core::types::FactionId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionStats {
    /// Turns begun, replays excluded
    pub turns: u32,
    pub replays: u32,
    pub actions_requested: u32,
    /// Reached the board, including lost battles and failed conversions
    pub actions_applied: u32,
    pub actions_rejected: u32,
    pub timeouts: u32,
    pub failures: u32,
    pub cancellations: u32,
    /// Wall time spent waiting on accepted decisions
    pub decision_ms: u64,
}

impl FactionStats {
    pub fn average_decision_ms(&self) -> Option<u64> {
        let answered = self.turns.saturating_sub(self.timeouts + self.failures);
        (answered > 0).then(|| self.decision_ms / answered as u64)
    }

    pub fn success_rate(&self) -> Option<f32> {
        (self.actions_requested > 0)
            .then(|| self.actions_applied as f32 / self.actions_requested as f32)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStats {
    pub factions: BTreeMap<FactionId, FactionStats>,
    pub privileged_acts: u32,
    pub privileged_rejected: u32,
}

impl TurnStats {
    pub fn new(participants: &[FactionId]) -> Self {
        Self {
            factions: participants
                .iter()
                .map(|id| (id.clone(), FactionStats::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn faction(&self, id: &FactionId) -> Option<&FactionStats> {
        self.factions.get(id)
    }

    fn entry(&mut self, id: &FactionId) -> &mut FactionStats {
        self.factions.entry(id.clone()).or_default()
    }

    pub fn turn_started(&mut self, id: &FactionId, replay: bool) {
        let stats = self.entry(id);
        if replay {
            stats.replays += 1;
        } else {
            stats.turns += 1;
        }
    }

    pub fn decision_answered(&mut self, id: &FactionId, elapsed: Duration) {
        self.entry(id).decision_ms += elapsed.as_millis() as u64;
    }

    pub fn timed_out(&mut self, id: &FactionId) {
        self.entry(id).timeouts += 1;
    }

    pub fn failed(&mut self, id: &FactionId) {
        self.entry(id).failures += 1;
    }

    pub fn cancelled(&mut self, id: &FactionId) {
        self.entry(id).cancellations += 1;
    }

    pub fn record_batch(&mut self, id: &FactionId, records: &[ChangeRecord]) {
        let stats = self.entry(id);
        for record in records {
            stats.actions_requested += 1;
            if record.applied() {
                stats.actions_applied += 1;
            } else {
                stats.actions_rejected += 1;
            }
        }
    }

    pub fn record_privileged(&mut self, record: &ChangeRecord) {
        if record.applied() {
            self.privileged_acts += 1;
        } else {
            self.privileged_rejected += 1;
        }
    }
}
