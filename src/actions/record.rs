//! Change records - the unit of broadcast, history and animation replay

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::action::Action;
use crate::board::{Building, Resource, Terrain};
use crate::core::types::{Actor, Coord, FactionId};

/// Why an action was not applied
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("{coord} is off the board")]
    OutOfBounds { coord: Coord },

    #[error("{coord} is not yours")]
    NotOwner { coord: Coord },

    #[error("{from} and {to} are not adjacent")]
    NotAdjacent { from: Coord, to: Coord },

    #[error("count must be at least 1")]
    ZeroCount,

    #[error("only {have} troops available, {need} requested")]
    InsufficientTroops { have: u32, need: u32 },

    #[error("not enough {resource}: have {have}, need {need}")]
    InsufficientResources { resource: Resource, have: u32, need: u32 },

    #[error("{coord} would exceed {max} troops")]
    CapacityExceeded { coord: Coord, max: u32 },

    #[error("{coord} already has a building")]
    BuildingPresent { coord: Coord },

    #[error("{coord} is already yours")]
    AlreadyOwned { coord: Coord },

    #[error("no territory of yours borders {coord}")]
    NoFootholdNear { coord: Coord },

    #[error("unknown faction {faction}")]
    UnknownFaction { faction: FactionId },

    #[error("cannot message yourself")]
    SelfMessage,

    #[error("the game is over")]
    GameFinished,
}

/// Combat detail for animation and feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    pub from: Coord,
    pub to: Coord,
    pub committed: u32,
    pub defender: Option<FactionId>,
    pub attack_power: f32,
    pub defense_power: f32,
    pub attacker_won: bool,
    pub source_before: u32,
    pub source_after: u32,
    pub target_before: u32,
    pub target_after: u32,
}

/// Category-specific result of applying one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Rejected {
        reason: Rejection,
    },
    Recruited {
        at: Coord,
        added: u32,
        troops: u32,
    },
    Relocated {
        from: Coord,
        to: Coord,
        count: u32,
        from_troops: u32,
        to_troops: u32,
    },
    Battle(BattleReport),
    Converted {
        target: Coord,
        chance: f32,
        /// Previous owner, None if the tile was neutral
        previous_owner: Option<FactionId>,
        /// Where the fleeing garrison went, and how many landed on each tile
        evicted: Vec<(Coord, u32)>,
        /// Fleeing troops that had nowhere to go
        lost: u32,
        troops: u32,
    },
    ConversionFailed {
        target: Coord,
        chance: f32,
    },
    Constructed {
        at: Coord,
        building: Building,
    },
    MessageSent {
        to: FactionId,
        text: String,
    },
    Smitten {
        tiles: Vec<Coord>,
    },
    Blessed {
        tiles: Vec<Coord>,
        added: u32,
    },
    Sanctified {
        at: Coord,
        previous: Terrain,
    },
    Observed,
}

/// One applied (or rejected) action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub actor: Actor,
    pub round: u32,
    pub action: Action,
    pub success: bool,
    pub outcome: Outcome,
}

impl ChangeRecord {
    pub fn new(actor: Actor, round: u32, action: Action, outcome: Outcome) -> Self {
        let success = !matches!(
            outcome,
            Outcome::Rejected { .. }
                | Outcome::ConversionFailed { .. }
                | Outcome::Battle(BattleReport {
                    attacker_won: false,
                    ..
                })
        );
        Self {
            actor,
            round,
            action,
            success,
            outcome,
        }
    }

    pub fn rejected(actor: Actor, round: u32, action: Action, reason: Rejection) -> Self {
        Self::new(actor, round, action, Outcome::Rejected { reason })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.outcome {
            Outcome::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    /// True if the action reached the board, whether or not it achieved its aim
    pub fn applied(&self) -> bool {
        self.rejection().is_none()
    }

    /// One line for the acting faction's next-turn feedback
    pub fn feedback(&self) -> String {
        let kind = self.action.kind();
        match &self.outcome {
            Outcome::Rejected { reason } => format!("{:?} rejected: {}", kind, reason),
            Outcome::Battle(b) if b.attacker_won => {
                format!("attack {} -> {} won, {} troops hold it", b.from, b.to, b.target_after)
            }
            Outcome::Battle(b) => format!(
                "attack {} -> {} failed, defenders left with {}",
                b.from, b.to, b.target_after
            ),
            Outcome::ConversionFailed { target, chance } => format!(
                "conversion of {} failed ({:.0}% chance)",
                target,
                chance * 100.0
            ),
            _ => format!("{:?} succeeded", kind),
        }
    }
}
