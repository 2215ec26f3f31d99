//! The observer's path onto the board. Bypasses turn order entirely.

use crate::actions::{Outcome, PrivilegedAction, Rejection};
use crate::board::{GameState, Terrain, MAX_TROOPS};
use crate::core::types::FactionId;

/// Troops added to each owned tile in a blessed area
pub const BLESS_TROOPS: u32 = 3;

pub fn validate(state: &GameState, action: &PrivilegedAction) -> Result<(), Rejection> {
    if state.is_finished() {
        return Err(Rejection::GameFinished);
    }
    match action.target() {
        Some(coord) if !coord.in_bounds() => Err(Rejection::OutOfBounds { coord }),
        _ => Ok(()),
    }
}

/// Factions whose narrative state should react to the act.
/// Area acts touch the owners inside the area; an observation speaks to everyone.
pub fn affected_participants(state: &GameState, action: &PrivilegedAction) -> Vec<FactionId> {
    if let PrivilegedAction::Observe { .. } = action {
        return state.participants.clone();
    }
    let area = action.area();
    state
        .participants
        .iter()
        .filter(|id| {
            area.iter()
                .filter_map(|c| state.tile(*c))
                .any(|t| t.is_owned_by(id))
        })
        .cloned()
        .collect()
}

pub(super) fn apply_validated(state: &mut GameState, action: &PrivilegedAction) -> Outcome {
    match action {
        PrivilegedAction::Smite { .. } => {
            let tiles = action.area();
            for coord in &tiles {
                if let Some(tile) = state.tile_mut(*coord) {
                    tile.set_troops(0);
                    tile.set_building(None);
                }
            }
            Outcome::Smitten { tiles }
        }
        PrivilegedAction::Bless { .. } => {
            let mut blessed = Vec::new();
            for coord in action.area() {
                if let Some(tile) = state.tile_mut(coord) {
                    if tile.owner().is_some() {
                        let troops = (tile.troops() + BLESS_TROOPS).min(MAX_TROOPS);
                        tile.set_troops(troops);
                        blessed.push(coord);
                    }
                }
            }
            Outcome::Blessed {
                tiles: blessed,
                added: BLESS_TROOPS,
            }
        }
        PrivilegedAction::Sanctify { target, .. } => {
            let mut previous = Terrain::Sacred;
            if let Some(tile) = state.tile_mut(*target) {
                previous = tile.terrain;
                tile.terrain = Terrain::Sacred;
            }
            Outcome::Sanctified {
                at: *target,
                previous,
            }
        }
        PrivilegedAction::Observe { .. } => Outcome::Observed,
    }
}
