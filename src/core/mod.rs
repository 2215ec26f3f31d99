pub mod config;
pub mod error;
pub mod types;

pub use config::GameConfig;
pub use error::{GameError, Result};
pub use types::{Actor, Coord, EventId, FactionId, SessionId, BOARD_SIZE};
