//! Session configuration with documented constants
//!
//! Game rules that never change between sessions (costs, combat curves) live
//! next to the code that uses them. The values here are the knobs an operator
//! may want to turn per session: pacing, timeouts, starting economy.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::error::{GameError, Result};

/// Configuration for a game session
///
/// Every field has a default, so a TOML file only needs to mention the
/// values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === WORLD ===
    /// Seed for terrain generation, combat rolls and conversion rolls
    pub seed: u64,

    /// Long-game ceiling. Once the round counter passes this value the
    /// faction owning the most tiles wins, guaranteeing termination.
    pub max_rounds: u32,

    /// Troops placed on each faction's starting tile
    pub starting_troops: u32,

    /// Material each faction starts with
    pub starting_material: u32,

    /// Faith each faction starts with
    pub starting_faith: u32,

    // === PACING ===
    /// Upper bound on a single decision request (seconds)
    ///
    /// A stalled provider must not wedge the loop. On expiry the turn
    /// proceeds as if the provider returned no actions.
    pub decision_timeout_secs: u64,

    /// Upper bound on a single enrichment call (seconds)
    ///
    /// Enrichment gates the affected faction's next turn, so it is bounded
    /// too. On expiry the faction keeps its previous flavor state.
    pub enrichment_timeout_secs: u64,

    /// Pause after an empty batch before advancing (milliseconds)
    ///
    /// Empty batches produce no animation, so no acknowledgement is awaited.
    /// This keeps the turn banner visible long enough to read.
    pub settle_delay_ms: u64,

    // === CONTEXT ===
    /// How many recent privileged interventions decision providers see
    pub intervention_log_len: usize,

    // === SERVER ===
    /// Address for the websocket and HTTP control surface
    pub listen_addr: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_rounds: 30,
            starting_troops: 5,
            starting_material: 10,
            starting_faith: 5,
            decision_timeout_secs: 60,
            enrichment_timeout_secs: 30,
            settle_delay_ms: 500,
            intervention_log_len: 5,
            listen_addr: "127.0.0.1:8765".into(),
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(GameError::Config("max_rounds must be at least 1".into()));
        }

        if self.starting_troops == 0 || self.starting_troops > crate::board::MAX_TROOPS {
            return Err(GameError::Config(format!(
                "starting_troops ({}) must be in 1..={}",
                self.starting_troops,
                crate::board::MAX_TROOPS
            )));
        }

        if self.decision_timeout_secs == 0 || self.enrichment_timeout_secs == 0 {
            return Err(GameError::Config("timeouts must be positive".into()));
        }

        if self.intervention_log_len == 0 {
            return Err(GameError::Config(
                "intervention_log_len must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
