//! Divine Grid - LLM factions on a 10x10 board, watched by an observer who
//! can intervene at any moment

pub mod actions;
pub mod agents;
pub mod board;
pub mod combat;
pub mod core;
pub mod llm;
pub mod resolver;
pub mod session;
pub mod transport;
