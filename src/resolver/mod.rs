//! Action resolver
//!
//! The only component that mutates the board in response to an action.
//! Every apply runs validation first; a rejected action produces a record
//! but never touches tiles or ledgers.

pub mod faction;
pub mod privileged;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::actions::{Action, ChangeRecord, FactionAction, PrivilegedAction, Rejection};
use crate::board::GameState;
use crate::core::types::{Actor, FactionId};

pub use faction::{
    conversion_chance, CONVERTED_GARRISON, CONVERT_COST, RECRUIT_COST_PER_TROOP,
};
pub use privileged::{affected_participants, BLESS_TROOPS};

/// Applies actions against a [`GameState`], owning the rng for combat and
/// conversion rolls
#[derive(Debug, Clone)]
pub struct Resolver {
    rng: ChaCha8Rng,
}

impl Resolver {
    pub fn new(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }

    pub fn validate(
        state: &GameState,
        actor: &FactionId,
        action: &FactionAction,
    ) -> Result<(), Rejection> {
        faction::validate(state, actor, action)
    }

    pub fn validate_privileged(state: &GameState, action: &PrivilegedAction) -> Result<(), Rejection> {
        privileged::validate(state, action)
    }

    /// Validate and apply one faction action, appending the record to history
    pub fn apply(
        &mut self,
        state: &mut GameState,
        actor: &FactionId,
        action: FactionAction,
    ) -> ChangeRecord {
        let outcome = faction::validate(state, actor, &action)
            .and_then(|()| faction::apply_validated(state, actor, &action, &mut self.rng));

        let who = Actor::Faction(actor.clone());
        let record = match outcome {
            Ok(outcome) => ChangeRecord::new(who, state.round, Action::Faction(action), outcome),
            Err(reason) => {
                tracing::debug!(faction = %actor, %reason, "action rejected");
                ChangeRecord::rejected(who, state.round, Action::Faction(action), reason)
            }
        };
        state.record(record.clone());
        record
    }

    /// Validate and apply an observer act, logging it for decision providers
    pub fn apply_privileged(&mut self, state: &mut GameState, action: PrivilegedAction) -> ChangeRecord {
        let record = match privileged::validate(state, &action) {
            Ok(()) => {
                let outcome = privileged::apply_validated(state, &action);
                state.log_intervention(action.clone(), action.to_string());
                ChangeRecord::new(
                    Actor::Observer,
                    state.round,
                    Action::Privileged(action),
                    outcome,
                )
            }
            Err(reason) => ChangeRecord::rejected(
                Actor::Observer,
                state.round,
                Action::Privileged(action),
                reason,
            ),
        };
        state.record(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionKind, Outcome};
    use crate::board::{Building, Resource, Terrain};
    use crate::core::config::GameConfig;
    use crate::core::types::Coord;

    fn red() -> FactionId {
        "Red".into()
    }

    fn blue() -> FactionId {
        "Blue".into()
    }

    fn board() -> GameState {
        let mut state = GameState::empty(&[red(), blue()], &GameConfig::default()).unwrap();
        state.setup_tile(Coord::new(2, 2), Some(red()), 5, None).unwrap();
        state.setup_tile(Coord::new(3, 2), Some(blue()), 4, None).unwrap();
        state.start();
        state
    }

    /// One representative action per kind. The match is exhaustive, so adding
    /// an action kind without a resolver path fails to compile here.
    fn sample(kind: ActionKind) -> Action {
        let c = Coord::new(2, 2);
        let reason = String::new();
        match kind {
            ActionKind::Recruit => FactionAction::Recruit { at: c, count: 1, reason }.into(),
            ActionKind::Move => FactionAction::Move {
                from: c,
                to: Coord::new(2, 3),
                count: 1,
                reason,
            }
            .into(),
            ActionKind::Convert => FactionAction::Convert {
                target: Coord::new(3, 2),
                reason,
            }
            .into(),
            ActionKind::Construct => FactionAction::Construct {
                at: c,
                building: Building::Tower,
                reason,
            }
            .into(),
            ActionKind::Message => FactionAction::Message {
                to: blue(),
                text: "peace?".into(),
                reason,
            }
            .into(),
            ActionKind::Smite => PrivilegedAction::Smite { center: c, reason }.into(),
            ActionKind::Bless => PrivilegedAction::Bless { center: c, reason }.into(),
            ActionKind::Sanctify => PrivilegedAction::Sanctify { target: c, reason }.into(),
            ActionKind::Observe => PrivilegedAction::Observe { reason }.into(),
        }
    }

    #[test]
    fn test_every_action_kind_reaches_the_board() {
        for kind in ActionKind::ALL {
            let mut state = board();
            let mut resolver = Resolver::new(11);
            let record = match sample(kind) {
                Action::Faction(a) => resolver.apply(&mut state, &red(), a),
                Action::Privileged(a) => resolver.apply_privileged(&mut state, a),
            };
            assert!(record.applied(), "{:?} was rejected: {:?}", kind, record.rejection());
            assert_eq!(record.action.kind(), kind);
            assert_eq!(state.history().len(), 1);
        }
    }

    #[test]
    fn test_rejected_action_changes_nothing() {
        let mut state = board();
        let before = state.tiles().to_vec();
        let mut resolver = Resolver::new(1);

        let record = resolver.apply(
            &mut state,
            &red(),
            FactionAction::Recruit {
                at: Coord::new(2, 2),
                count: 40,
                reason: String::new(),
            },
        );
        assert!(matches!(
            record.rejection(),
            Some(Rejection::InsufficientResources { resource: Resource::Material, .. })
        ));
        assert_eq!(state.tiles(), &before[..]);
        assert_eq!(state.faction(&red()).unwrap().ledger.get(Resource::Material), 10);
    }

    #[test]
    fn test_barracks_bonus() {
        let mut state = GameState::empty(&[red(), blue()], &GameConfig::default()).unwrap();
        state
            .setup_tile(Coord::new(0, 0), Some(red()), 2, Some(Building::Barracks))
            .unwrap();
        state.start();
        let mut resolver = Resolver::new(1);
        let record = resolver.apply(
            &mut state,
            &red(),
            FactionAction::Recruit {
                at: Coord::new(0, 0),
                count: 3,
                reason: String::new(),
            },
        );
        assert_eq!(
            record.outcome,
            Outcome::Recruited {
                at: Coord::new(0, 0),
                added: 4,
                troops: 6
            }
        );
    }

    #[test]
    fn test_construct_never_replaces() {
        let mut state = GameState::empty(&[red(), blue()], &GameConfig::default()).unwrap();
        state
            .setup_tile(Coord::new(0, 0), Some(red()), 2, Some(Building::Farm))
            .unwrap();
        state.start();
        let mut resolver = Resolver::new(1);
        let record = resolver.apply(
            &mut state,
            &red(),
            FactionAction::Construct {
                at: Coord::new(0, 0),
                building: Building::Tower,
                reason: String::new(),
            },
        );
        assert_eq!(
            record.rejection(),
            Some(&Rejection::BuildingPresent {
                coord: Coord::new(0, 0)
            })
        );
        assert_eq!(state.tile(Coord::new(0, 0)).unwrap().building(), Some(Building::Farm));
    }

    #[test]
    fn test_move_requires_adjacency_and_ownership() {
        let mut state = board();
        let mut resolver = Resolver::new(1);
        let far = resolver.apply(
            &mut state,
            &red(),
            FactionAction::Move {
                from: Coord::new(2, 2),
                to: Coord::new(4, 2),
                count: 1,
                reason: String::new(),
            },
        );
        assert!(matches!(far.rejection(), Some(Rejection::NotAdjacent { .. })));

        let foreign = resolver.apply(
            &mut state,
            &red(),
            FactionAction::Move {
                from: Coord::new(3, 2),
                to: Coord::new(3, 3),
                count: 1,
                reason: String::new(),
            },
        );
        assert!(matches!(foreign.rejection(), Some(Rejection::NotOwner { .. })));

        let diagonal = resolver.apply(
            &mut state,
            &red(),
            FactionAction::Move {
                from: Coord::new(2, 2),
                to: Coord::new(3, 3),
                count: 1,
                reason: String::new(),
            },
        );
        assert!(matches!(diagonal.rejection(), Some(Rejection::NotAdjacent { .. })));
    }

    #[test]
    fn test_sanctify_changes_terrain() {
        let mut state = board();
        let mut resolver = Resolver::new(1);
        let record = resolver.apply_privileged(
            &mut state,
            PrivilegedAction::Sanctify {
                target: Coord::new(5, 5),
                reason: "holy ground".into(),
            },
        );
        assert_eq!(
            record.outcome,
            Outcome::Sanctified {
                at: Coord::new(5, 5),
                previous: Terrain::Plains
            }
        );
        assert_eq!(state.tile(Coord::new(5, 5)).unwrap().terrain, Terrain::Sacred);
        assert_eq!(state.interventions().count(), 1);
    }

    #[test]
    fn test_privileged_out_of_bounds_rejected() {
        let mut state = board();
        let mut resolver = Resolver::new(1);
        let record = resolver.apply_privileged(
            &mut state,
            PrivilegedAction::Smite {
                center: Coord::new(10, 10),
                reason: String::new(),
            },
        );
        assert!(!record.applied());
        assert_eq!(state.interventions().count(), 0);
    }

    #[test]
    fn test_affected_participants() {
        let state = board();
        let smite = PrivilegedAction::Smite {
            center: Coord::new(1, 2),
            reason: String::new(),
        };
        assert_eq!(affected_participants(&state, &smite), vec![red()]);
        let observe = PrivilegedAction::Observe {
            reason: String::new(),
        };
        assert_eq!(affected_participants(&state, &observe), vec![red(), blue()]);
    }
}
