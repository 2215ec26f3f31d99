//! Board model - tiles, factions and the game state that owns them

pub mod faction;
pub mod state;
pub mod tile;

pub use faction::{Faction, Ledger, Resource, Shortfall};
pub use state::{GameState, GameStatus, Intervention, Victory, VictoryKind};
pub use tile::{Building, Terrain, Tile, Yield};

/// Troop ceiling for a single tile
pub const MAX_TROOPS: u32 = 50;

/// Starting corners limit the table to four factions
pub const MAX_FACTIONS: usize = 4;
