//! LLM-backed decision and enrichment collaborators

use async_trait::async_trait;
use std::sync::Arc;

use crate::agents::enrichment::MEMORY_LIMIT;
use crate::agents::{
    CancelToken, Decision, DecisionProvider, EnrichmentService, FlavorBook, PrivilegedEvent,
    ProviderError, TurnContext,
};
use crate::core::error::Result;
use crate::core::types::FactionId;
use crate::llm::client::LlmClient;
use crate::llm::context::PromptContext;
use crate::llm::parser::{
    parse_decision, parse_personality, DECISION_SYSTEM_PROMPT, ENRICHMENT_SYSTEM_PROMPT,
};

/// Asks the model for a faction's turn. The HTTP request is dropped as soon
/// as the cancel token fires.
#[derive(Debug, Clone)]
pub struct LlmDecisionProvider {
    client: Arc<LlmClient>,
}

impl LlmDecisionProvider {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DecisionProvider for LlmDecisionProvider {
    async fn request_turn(
        &self,
        context: TurnContext,
        cancel: CancelToken,
    ) -> std::result::Result<Decision, ProviderError> {
        let prompt = format!(
            "{}\nDecide your actions for this turn. Reply with JSON:",
            PromptContext::from_turn(&context).summary()
        );

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            reply = self.client.complete(DECISION_SYSTEM_PROMPT, &prompt) => reply,
        };
        let reply = reply.map_err(|e| ProviderError::Failed(e.to_string()))?;
        let decision = parse_decision(&reply).map_err(|e| ProviderError::Failed(e.to_string()))?;
        tracing::debug!(
            faction = %context.faction,
            actions = decision.actions.len(),
            "model decision parsed"
        );
        Ok(decision)
    }
}

/// Rewrites each affected faction's personality with one model call per
/// faction. A faction whose call fails keeps its old personality but still
/// remembers the event.
#[derive(Debug, Clone)]
pub struct LlmEnrichment {
    client: Arc<LlmClient>,
}

impl LlmEnrichment {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EnrichmentService for LlmEnrichment {
    async fn enrich(
        &self,
        mut current: FlavorBook,
        event: &PrivilegedEvent,
        affected: &[FactionId],
    ) -> Result<FlavorBook> {
        for id in affected {
            let flavor = current.entry(id.clone()).or_default();
            let prompt = format!(
                "Faction: {}\nCurrent personality: {}\nThe gods acted in round {}: {}\n\
                 Rewrite the personality:",
                id, flavor.personality, event.round, event.summary
            );
            match self
                .client
                .complete(ENRICHMENT_SYSTEM_PROMPT, &prompt)
                .await
                .and_then(|reply| parse_personality(&reply))
            {
                Ok(personality) => flavor.personality = personality,
                Err(e) => tracing::warn!(faction = %id, error = %e, "personality rewrite failed"),
            }
            flavor.remember(format!("round {}: {}", event.round, event.summary), MEMORY_LIMIT);
        }
        Ok(current)
    }
}
