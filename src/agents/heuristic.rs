//! Rule-based decision provider
//!
//! Used when no LLM endpoint is configured. Perceives the board from one
//! faction's point of view, then issues orders: attack where it has a clear
//! advantage, convert weak neighbours, reinforce the frontier, build.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::actions::FactionAction;
use crate::agents::cancel::CancelToken;
use crate::agents::provider::{Decision, DecisionProvider, ProviderError, TurnContext};
use crate::board::{Building, GameState, Resource, Tile, MAX_TROOPS};
use crate::combat::{defense_strength, effective_troops};
use crate::core::types::{Coord, FactionId};
use crate::resolver::{CONVERT_COST, RECRUIT_COST_PER_TROOP};

/// Attack only when committed strength beats the unrolled defense by this
/// factor, so the worst roll against the best roll still wins
const ATTACK_MARGIN: f32 = 1.5;

/// Conversions are only tried against garrisons this small
const CONVERT_MAX_GARRISON: u32 = 3;

/// Share of material kept back for buildings
const RECRUIT_SHARE: f32 = 0.5;

/// What the faction knows when it decides
#[derive(Debug)]
struct WorldModel {
    faction: FactionId,
    owned: Vec<Tile>,
    /// Non-owned tiles bordering our territory
    frontier: Vec<Tile>,
    material: u32,
    faith: u32,
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicProvider;

impl HeuristicProvider {
    pub fn new() -> Self {
        Self
    }

    fn perceive(&self, faction: &FactionId, board: &GameState) -> WorldModel {
        let owned: Vec<Tile> = board.tiles_of(faction).cloned().collect();
        let mut seen = BTreeSet::new();
        let mut frontier = Vec::new();
        for tile in &owned {
            for n in board.neighbors(tile.coord) {
                if !n.is_owned_by(faction) && seen.insert(n.coord) {
                    frontier.push(n.clone());
                }
            }
        }
        let ledger = board.faction(faction).map(|f| f.ledger.clone()).unwrap_or_default();
        WorldModel {
            faction: faction.clone(),
            owned,
            frontier,
            material: ledger.get(Resource::Material),
            faith: ledger.get(Resource::Faith),
        }
    }

    pub fn decide(&self, context: &TurnContext) -> Vec<FactionAction> {
        let world = self.perceive(&context.faction, &context.board);
        let mut orders = Vec::new();
        let mut targeted: BTreeSet<Coord> = BTreeSet::new();
        let mut material = world.material;
        let mut faith = world.faith;

        // Attacks, strongest garrison first
        let mut sources: Vec<&Tile> = world.owned.iter().filter(|t| t.troops() > 1).collect();
        sources.sort_by_key(|t| std::cmp::Reverse(t.troops()));
        for source in sources {
            let committed = source.troops() - 1;
            let target = world
                .frontier
                .iter()
                .filter(|t| t.coord.is_adjacent(&source.coord) && !targeted.contains(&t.coord))
                .filter(|t| has_advantage(committed, t))
                .min_by(|a, b| defense_strength(a).total_cmp(&defense_strength(b)));
            if let Some(target) = target {
                targeted.insert(target.coord);
                orders.push(FactionAction::Move {
                    from: source.coord,
                    to: target.coord,
                    count: committed,
                    reason: match target.owner() {
                        Some(owner) => format!("{} is weak at {}", owner, target.coord),
                        None => format!("claim open ground at {}", target.coord),
                    },
                });
            }
        }

        // One conversion per turn against a small garrison
        if faith >= CONVERT_COST {
            if let Some(target) = world
                .frontier
                .iter()
                .filter(|t| !targeted.contains(&t.coord) && t.troops() <= CONVERT_MAX_GARRISON)
                .min_by_key(|t| t.troops())
            {
                targeted.insert(target.coord);
                faith -= CONVERT_COST;
                orders.push(FactionAction::Convert {
                    target: target.coord,
                    reason: "spread the faith".into(),
                });
            }
        }

        // Reinforce the most exposed owned tile
        let exposed = world
            .owned
            .iter()
            .filter(|t| world.frontier.iter().any(|f| f.coord.is_adjacent(&t.coord)))
            .min_by_key(|t| t.troops());
        if let Some(tile) = exposed {
            let budget = ((material as f32 * RECRUIT_SHARE) as u32) / RECRUIT_COST_PER_TROOP;
            let room = MAX_TROOPS.saturating_sub(tile.troops());
            let count = budget.min(room);
            if count > 0 {
                material -= count * RECRUIT_COST_PER_TROOP;
                orders.push(FactionAction::Recruit {
                    at: tile.coord,
                    count,
                    reason: "hold the border".into(),
                });
            }
        }

        // Build on the first empty tile, economy before defense
        let wanted = if world.owned.iter().any(|t| t.building() == Some(Building::Farm)) {
            Building::Barracks
        } else {
            Building::Farm
        };
        let affordable = wanted
            .cost()
            .iter()
            .all(|(r, n)| *r != Resource::Material || *n <= material);
        if affordable && faith >= faith_cost(wanted) {
            if let Some(site) = world.owned.iter().find(|t| t.building().is_none()) {
                orders.push(FactionAction::Construct {
                    at: site.coord,
                    building: wanted,
                    reason: format!("{:?} for the future", wanted).to_lowercase(),
                });
            }
        }

        tracing::debug!(faction = %world.faction, orders = orders.len(), "heuristic decision");
        orders
    }
}

fn faith_cost(building: Building) -> u32 {
    building
        .cost()
        .iter()
        .filter(|(r, _)| *r == Resource::Faith)
        .map(|(_, n)| *n)
        .sum()
}

fn has_advantage(committed: u32, target: &Tile) -> bool {
    effective_troops(committed) > defense_strength(target) * ATTACK_MARGIN
}

#[async_trait]
impl DecisionProvider for HeuristicProvider {
    async fn request_turn(
        &self,
        context: TurnContext,
        cancel: CancelToken,
    ) -> Result<Decision, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let actions = self.decide(&context);
        Ok(Decision::new(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::enrichment::FlavorState;
    use crate::core::config::GameConfig;

    fn context(board: GameState, faction: &str) -> TurnContext {
        TurnContext {
            faction: faction.into(),
            round: board.round,
            turn: board.turn,
            board,
            interventions: Vec::new(),
            feedback: Vec::new(),
            inbox: Vec::new(),
            flavor: FlavorState::default(),
        }
    }

    fn board() -> GameState {
        let ids: Vec<FactionId> = vec!["Red".into(), "Blue".into()];
        let mut state = GameState::empty(&ids, &GameConfig::default()).unwrap();
        state.setup_tile(Coord::new(4, 4), Some("Red".into()), 20, None).unwrap();
        state.setup_tile(Coord::new(5, 4), Some("Blue".into()), 1, None).unwrap();
        state.setup_tile(Coord::new(9, 9), Some("Blue".into()), 30, None).unwrap();
        state.start();
        state
    }

    #[test]
    fn test_attacks_weak_neighbour() {
        let orders = HeuristicProvider::new().decide(&context(board(), "Red"));
        assert!(orders.iter().any(|o| matches!(
            o,
            FactionAction::Move { from, count: 19, .. } if *from == Coord::new(4, 4)
        )));
    }

    #[test]
    fn test_spending_stays_within_budget() {
        let ctx = context(board(), "Red");
        let orders = HeuristicProvider::new().decide(&ctx);
        let material: u32 = orders
            .iter()
            .map(|o| match o {
                FactionAction::Recruit { count, .. } => count * RECRUIT_COST_PER_TROOP,
                FactionAction::Construct { building, .. } => building
                    .cost()
                    .iter()
                    .filter(|(r, _)| *r == Resource::Material)
                    .map(|(_, n)| *n)
                    .sum(),
                _ => 0,
            })
            .sum();
        assert!(material <= ctx.material());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let result = HeuristicProvider::new()
            .request_turn(context(board(), "Red"), token)
            .await;
        assert_eq!(result, Err(ProviderError::Cancelled));
    }
}
