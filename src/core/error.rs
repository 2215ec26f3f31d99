use thiserror::Error;

use crate::core::types::{Coord, FactionId};

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Coordinate out of bounds: {0}")]
    InvalidCoord(Coord),

    #[error("Unknown faction: {0}")]
    UnknownFaction(FactionId),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid setup: {0}")]
    InvalidSetup(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, GameError>;
