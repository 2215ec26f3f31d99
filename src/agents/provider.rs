//! Decision provider seam
//!
//! A provider is asked for one faction's actions per turn. It runs outside
//! the game loop and may be cancelled at any moment by an observer act.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::FactionAction;
use crate::agents::cancel::CancelToken;
use crate::agents::enrichment::FlavorState;
use crate::board::{GameState, Intervention, Resource};
use crate::core::types::FactionId;

/// Everything a provider may base its decision on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnContext {
    pub faction: FactionId,
    pub round: u32,
    pub turn: u32,
    /// Deep copy taken when the request was issued
    pub board: GameState,
    /// Recent observer acts, oldest first
    pub interventions: Vec<Intervention>,
    /// How each action of this faction's previous batch went
    pub feedback: Vec<String>,
    /// Diplomatic messages received since the last turn: (sender, text)
    pub inbox: Vec<(FactionId, String)>,
    pub flavor: FlavorState,
}

impl TurnContext {
    pub fn material(&self) -> u32 {
        self.resource(Resource::Material)
    }

    pub fn faith(&self) -> u32 {
        self.resource(Resource::Faith)
    }

    fn resource(&self, resource: Resource) -> u32 {
        self.board
            .faction(&self.faction)
            .map(|f| f.ledger.get(resource))
            .unwrap_or(0)
    }
}

/// A provider's answer for one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub actions: Vec<FactionAction>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Decision {
    pub fn new(actions: Vec<FactionAction>) -> Self {
        Self {
            actions,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request was cancelled. Not a failure.
    #[error("decision request cancelled")]
    Cancelled,

    #[error("decision request timed out")]
    TimedOut,

    #[error("decision provider failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Produce this turn's actions.
    ///
    /// Implementations should stop work promptly once `cancel` fires and
    /// return [`ProviderError::Cancelled`]. The orchestrator drops late
    /// results either way.
    async fn request_turn(
        &self,
        context: TurnContext,
        cancel: CancelToken,
    ) -> Result<Decision, ProviderError>;
}
