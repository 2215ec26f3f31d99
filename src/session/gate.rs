//! Enrichment gate
//!
//! Tracks which factions are waiting on an outstanding enrichment call. A
//! faction may not start a decision while any call that affects it is
//! pending; factions outside every pending call are never held up.

use std::collections::BTreeMap;

use crate::core::types::{EventId, FactionId};

#[derive(Debug, Default)]
pub struct EnrichmentGate {
    pending: BTreeMap<EventId, Vec<FactionId>>,
}

impl EnrichmentGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: EventId, affected: Vec<FactionId>) {
        self.pending.insert(event, affected);
    }

    /// Close an event, returning the factions it covered
    pub fn complete(&mut self, event: EventId) -> Vec<FactionId> {
        self.pending.remove(&event).unwrap_or_default()
    }

    pub fn is_blocked(&self, faction: &FactionId) -> bool {
        self.pending.values().any(|affected| affected.contains(faction))
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_only_affected() {
        let red: FactionId = "Red".into();
        let blue: FactionId = "Blue".into();
        let mut gate = EnrichmentGate::new();
        let first = EventId::new();
        let second = EventId::new();
        gate.register(first, vec![red.clone()]);
        gate.register(second, vec![red.clone()]);

        assert!(gate.is_blocked(&red));
        assert!(!gate.is_blocked(&blue));

        assert_eq!(gate.complete(first), vec![red.clone()]);
        assert!(gate.is_blocked(&red), "second event still pending");
        gate.complete(second);
        assert!(!gate.is_blocked(&red));
        assert!(gate.complete(second).is_empty());
        assert_eq!(gate.pending(), 0);
    }
}
