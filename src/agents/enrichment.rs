//! Narrative flavor and the enrichment seam
//!
//! Flavor is opaque to the game loop. After an observer act the enrichment
//! service rewrites the flavor of the factions that felt it; the session only
//! guarantees those factions see the result before their next decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actions::PrivilegedAction;
use crate::core::error::Result;
use crate::core::types::{EventId, FactionId};

/// Memories kept per faction by [`StaticEnrichment`]
pub const MEMORY_LIMIT: usize = 8;

/// A faction's personality and what it remembers of the observer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorState {
    pub personality: String,
    #[serde(default)]
    pub memories: Vec<String>,
}

impl FlavorState {
    pub fn new(personality: impl Into<String>) -> Self {
        Self {
            personality: personality.into(),
            memories: Vec::new(),
        }
    }

    pub fn remember(&mut self, memory: impl Into<String>, limit: usize) {
        self.memories.push(memory.into());
        if self.memories.len() > limit {
            let excess = self.memories.len() - limit;
            self.memories.drain(..excess);
        }
    }
}

pub type FlavorBook = BTreeMap<FactionId, FlavorState>;

/// The observer act an enrichment call is keyed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegedEvent {
    pub id: EventId,
    pub round: u32,
    pub action: PrivilegedAction,
    pub summary: String,
}

impl PrivilegedEvent {
    pub fn new(round: u32, action: PrivilegedAction) -> Self {
        Self {
            id: EventId::new(),
            round,
            summary: action.to_string(),
            action,
        }
    }
}

#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Return the updated flavor for `affected`. Entries for other factions
    /// are ignored by the caller. An error leaves the prior flavor in place.
    async fn enrich(
        &self,
        current: FlavorBook,
        event: &PrivilegedEvent,
        affected: &[FactionId],
    ) -> Result<FlavorBook>;
}

/// Appends the event summary to each affected faction's memories
#[derive(Debug, Clone)]
pub struct StaticEnrichment {
    limit: usize,
}

impl StaticEnrichment {
    pub fn new() -> Self {
        Self {
            limit: MEMORY_LIMIT,
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for StaticEnrichment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnrichmentService for StaticEnrichment {
    async fn enrich(
        &self,
        mut current: FlavorBook,
        event: &PrivilegedEvent,
        affected: &[FactionId],
    ) -> Result<FlavorBook> {
        for id in affected {
            current
                .entry(id.clone())
                .or_default()
                .remember(format!("round {}: {}", event.round, event.summary), self.limit);
        }
        Ok(current)
    }
}
