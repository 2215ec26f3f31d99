//! Decision and enrichment collaborators
//!
//! The session talks to the outside world through two traits:
//! [`DecisionProvider`] picks a faction's actions, [`EnrichmentService`]
//! rewrites faction flavor after an observer act.

pub mod cancel;
pub mod enrichment;
pub mod heuristic;
pub mod provider;
pub mod scripted;

pub use cancel::CancelToken;
pub use enrichment::{EnrichmentService, FlavorBook, FlavorState, PrivilegedEvent, StaticEnrichment};
pub use heuristic::HeuristicProvider;
pub use provider::{Decision, DecisionProvider, ProviderError, TurnContext};
pub use scripted::{ScriptedProvider, Step};
