//! LLM integration
//!
//! Optional: the game runs on heuristic providers when no endpoint is
//! configured.

pub mod client;
pub mod context;
pub mod parser;
pub mod provider;

pub use client::{ApiFormat, LlmClient};
pub use context::PromptContext;
pub use parser::{extract_json, parse_decision};
pub use provider::{LlmDecisionProvider, LlmEnrichment};
