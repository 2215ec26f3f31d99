//! Validation and application of faction actions

use rand::Rng;

use crate::actions::{BattleReport, FactionAction, Outcome, Rejection};
use crate::board::{GameState, Resource, Shortfall, MAX_TROOPS};
use crate::combat::resolve_attack;
use crate::core::types::{Coord, FactionId};

/// Material per recruited troop
pub const RECRUIT_COST_PER_TROOP: u32 = 1;

/// Faith spent per conversion attempt, successful or not
pub const CONVERT_COST: u32 = 3;

/// Conversion chance = base + per_faith * faith, capped below certainty
pub const CONVERT_BASE_CHANCE: f32 = 0.2;
pub const CONVERT_CHANCE_PER_FAITH: f32 = 0.05;
pub const CONVERT_MAX_CHANCE: f32 = 0.9;

/// Troops the converting faction places on a won-over tile
pub const CONVERTED_GARRISON: u32 = 1;

pub fn conversion_chance(faith: u32) -> f32 {
    (CONVERT_BASE_CHANCE + CONVERT_CHANCE_PER_FAITH * faith as f32).min(CONVERT_MAX_CHANCE)
}

fn shortfall(s: Shortfall) -> Rejection {
    Rejection::InsufficientResources {
        resource: s.resource,
        have: s.have,
        need: s.need,
    }
}

fn owned_tile(state: &GameState, actor: &FactionId, coord: Coord) -> Result<u32, Rejection> {
    let tile = state.tile(coord).ok_or(Rejection::OutOfBounds { coord })?;
    if !tile.is_owned_by(actor) {
        return Err(Rejection::NotOwner { coord });
    }
    Ok(tile.troops())
}

/// Check every precondition without touching the state
pub fn validate(state: &GameState, actor: &FactionId, action: &FactionAction) -> Result<(), Rejection> {
    if state.is_finished() {
        return Err(Rejection::GameFinished);
    }
    let faction = state.faction(actor).ok_or_else(|| Rejection::UnknownFaction {
        faction: actor.clone(),
    })?;

    match action {
        FactionAction::Recruit { at, count, .. } => {
            if *count == 0 {
                return Err(Rejection::ZeroCount);
            }
            let troops = owned_tile(state, actor, *at)?;
            faction
                .ledger
                .check(&[(Resource::Material, count * RECRUIT_COST_PER_TROOP)])
                .map_err(shortfall)?;
            if troops + count > MAX_TROOPS {
                return Err(Rejection::CapacityExceeded {
                    coord: *at,
                    max: MAX_TROOPS,
                });
            }
            Ok(())
        }
        FactionAction::Move { from, to, count, .. } => {
            if *count == 0 {
                return Err(Rejection::ZeroCount);
            }
            let available = owned_tile(state, actor, *from)?;
            let target = state.tile(*to).ok_or(Rejection::OutOfBounds { coord: *to })?;
            if !state.adjacent(*from, *to) {
                return Err(Rejection::NotAdjacent {
                    from: *from,
                    to: *to,
                });
            }
            if available < *count {
                return Err(Rejection::InsufficientTroops {
                    have: available,
                    need: *count,
                });
            }
            if target.is_owned_by(actor) && target.troops() + count > MAX_TROOPS {
                return Err(Rejection::CapacityExceeded {
                    coord: *to,
                    max: MAX_TROOPS,
                });
            }
            Ok(())
        }
        FactionAction::Convert { target, .. } => {
            let tile = state
                .tile(*target)
                .ok_or(Rejection::OutOfBounds { coord: *target })?;
            if tile.is_owned_by(actor) {
                return Err(Rejection::AlreadyOwned { coord: *target });
            }
            if !state.neighbors(*target).any(|n| n.is_owned_by(actor)) {
                return Err(Rejection::NoFootholdNear { coord: *target });
            }
            faction
                .ledger
                .check(&[(Resource::Faith, CONVERT_COST)])
                .map_err(shortfall)
        }
        FactionAction::Construct { at, building, .. } => {
            owned_tile(state, actor, *at)?;
            if state.tile(*at).and_then(|t| t.building()).is_some() {
                return Err(Rejection::BuildingPresent { coord: *at });
            }
            faction.ledger.check(building.cost()).map_err(shortfall)
        }
        FactionAction::Message { to, .. } => {
            if to == actor {
                return Err(Rejection::SelfMessage);
            }
            if state.faction(to).is_none() {
                return Err(Rejection::UnknownFaction {
                    faction: to.clone(),
                });
            }
            Ok(())
        }
    }
}

/// Apply an action that has already passed [`validate`].
///
/// Every debit here is preceded by the affordability check in `validate`,
/// so the ledger calls cannot fail; a failure would be a validation bug and
/// is reported as a rejection rather than a partial mutation.
pub(super) fn apply_validated<R: Rng + ?Sized>(
    state: &mut GameState,
    actor: &FactionId,
    action: &FactionAction,
    rng: &mut R,
) -> Result<Outcome, Rejection> {
    match action {
        FactionAction::Recruit { at, count, .. } => {
            debit(state, actor, &[(Resource::Material, count * RECRUIT_COST_PER_TROOP)])?;
            let tile = state
                .tile_mut(*at)
                .ok_or(Rejection::OutOfBounds { coord: *at })?;
            let bonus = tile.building().map(|b| b.recruit_bonus()).unwrap_or(0);
            let before = tile.troops();
            tile.set_troops(before + count + bonus);
            Ok(Outcome::Recruited {
                at: *at,
                added: tile.troops() - before,
                troops: tile.troops(),
            })
        }
        FactionAction::Move { from, to, count, .. } => {
            let source = state
                .tile(*from)
                .cloned()
                .ok_or(Rejection::OutOfBounds { coord: *from })?;
            let target = state
                .tile(*to)
                .cloned()
                .ok_or(Rejection::OutOfBounds { coord: *to })?;

            // Same owner relocates, anything else is an attack
            if target.owner() == source.owner() {
                let from_troops = source.troops() - count;
                let to_troops = target.troops() + count;
                set_troops(state, *from, from_troops);
                set_troops(state, *to, to_troops);
                return Ok(Outcome::Relocated {
                    from: *from,
                    to: *to,
                    count: *count,
                    from_troops,
                    to_troops,
                });
            }

            let result = resolve_attack(&source, &target, *count, rng);
            set_troops(state, *from, result.source_troops);
            if let Some(tile) = state.tile_mut(*to) {
                if result.attacker_won {
                    tile.set_owner(Some(actor.clone()));
                }
                tile.set_troops(result.target_troops);
            }
            Ok(Outcome::Battle(BattleReport {
                from: *from,
                to: *to,
                committed: *count,
                defender: target.owner().cloned(),
                attack_power: result.attack_power,
                defense_power: result.defense_power,
                attacker_won: result.attacker_won,
                source_before: source.troops(),
                source_after: result.source_troops,
                target_before: target.troops(),
                target_after: result.target_troops,
            }))
        }
        FactionAction::Convert { target, .. } => {
            let faith = state
                .faction(actor)
                .map(|f| f.ledger.get(Resource::Faith))
                .unwrap_or(0);
            let chance = conversion_chance(faith);
            debit(state, actor, &[(Resource::Faith, CONVERT_COST)])?;

            if rng.gen::<f32>() >= chance {
                return Ok(Outcome::ConversionFailed {
                    target: *target,
                    chance,
                });
            }
            convert(state, actor, *target, chance)
        }
        FactionAction::Construct { at, building, .. } => {
            debit(state, actor, building.cost())?;
            if let Some(tile) = state.tile_mut(*at) {
                tile.set_building(Some(*building));
            }
            Ok(Outcome::Constructed {
                at: *at,
                building: *building,
            })
        }
        FactionAction::Message { to, text, .. } => Ok(Outcome::MessageSent {
            to: to.clone(),
            text: text.clone(),
        }),
    }
}

fn debit(state: &mut GameState, actor: &FactionId, cost: &[(Resource, u32)]) -> Result<(), Rejection> {
    let faction = state
        .faction_mut(actor)
        .ok_or_else(|| Rejection::UnknownFaction {
            faction: actor.clone(),
        })?;
    faction.ledger.debit(cost).map_err(shortfall)
}

fn set_troops(state: &mut GameState, coord: Coord, troops: u32) {
    if let Some(tile) = state.tile_mut(coord) {
        tile.set_troops(troops);
    }
}

/// Hand the tile over. The old garrison flees to its owner's adjacent
/// tiles, split as evenly as possible; whatever cannot land is lost.
fn convert(
    state: &mut GameState,
    actor: &FactionId,
    target: Coord,
    chance: f32,
) -> Result<Outcome, Rejection> {
    let tile = state
        .tile(target)
        .cloned()
        .ok_or(Rejection::OutOfBounds { coord: target })?;
    let previous_owner = tile.owner().cloned();
    let garrison = tile.troops();

    set_troops(state, target, 0);

    let refuges: Vec<Coord> = match &previous_owner {
        Some(owner) => state
            .neighbors(target)
            .filter(|n| n.is_owned_by(owner))
            .map(|n| n.coord)
            .collect(),
        None => Vec::new(),
    };

    let mut evicted = Vec::new();
    let mut lost = garrison;
    if !refuges.is_empty() {
        let n = refuges.len() as u32;
        let share = garrison / n;
        let remainder = garrison % n;
        for (i, coord) in refuges.iter().enumerate() {
            let arriving = share + u32::from((i as u32) < remainder);
            if arriving == 0 {
                continue;
            }
            if let Some(refuge) = state.tile_mut(*coord) {
                let before = refuge.troops();
                refuge.set_troops(before + arriving);
                let landed = refuge.troops() - before;
                lost -= landed;
                evicted.push((*coord, landed));
            }
        }
    }

    if let Some(tile) = state.tile_mut(target) {
        tile.set_owner(Some(actor.clone()));
        tile.set_troops(CONVERTED_GARRISON);
    }

    Ok(Outcome::Converted {
        target,
        chance,
        previous_owner,
        evicted,
        lost,
        troops: CONVERTED_GARRISON,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_chance_capped() {
        assert!((conversion_chance(0) - 0.2).abs() < 1e-6);
        assert!((conversion_chance(4) - 0.4).abs() < 1e-6);
        assert!((conversion_chance(1000) - CONVERT_MAX_CHANCE).abs() < 1e-6);
        assert!(CONVERT_MAX_CHANCE < 1.0);
    }
}
