//! Submitted actions
//!
//! Actions are a closed set. The resolver matches on them exhaustively, so a
//! new variant does not compile until it has a validation and an apply path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::board::Building;
use crate::core::types::{Coord, FactionId};

/// Actions a faction may take on its own turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactionAction {
    /// Buy troops on an owned tile
    Recruit {
        at: Coord,
        count: u32,
        #[serde(default)]
        reason: String,
    },
    /// Relocate onto an owned tile, attack anything else
    Move {
        from: Coord,
        to: Coord,
        count: u32,
        #[serde(default)]
        reason: String,
    },
    /// Spend faith to try to win a tile over
    Convert {
        target: Coord,
        #[serde(default)]
        reason: String,
    },
    Construct {
        at: Coord,
        building: Building,
        #[serde(default)]
        reason: String,
    },
    /// Diplomatic message, delivered in the recipient's next turn context
    Message {
        to: FactionId,
        text: String,
        #[serde(default)]
        reason: String,
    },
}

impl FactionAction {
    pub fn reason(&self) -> &str {
        match self {
            Self::Recruit { reason, .. }
            | Self::Move { reason, .. }
            | Self::Convert { reason, .. }
            | Self::Construct { reason, .. }
            | Self::Message { reason, .. } => reason,
        }
    }

    /// The tile the action lands on, if any
    pub fn target(&self) -> Option<Coord> {
        match self {
            Self::Recruit { at, .. } | Self::Construct { at, .. } => Some(*at),
            Self::Move { to, .. } => Some(*to),
            Self::Convert { target, .. } => Some(*target),
            Self::Message { .. } => None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Recruit { .. } => ActionKind::Recruit,
            Self::Move { .. } => ActionKind::Move,
            Self::Convert { .. } => ActionKind::Convert,
            Self::Construct { .. } => ActionKind::Construct,
            Self::Message { .. } => ActionKind::Message,
        }
    }
}

/// Out-of-turn acts of the observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrivilegedAction {
    /// Zero troops and raze buildings in the 3x3 area
    Smite {
        center: Coord,
        #[serde(default)]
        reason: String,
    },
    /// Reinforce every owned tile in the 3x3 area
    Bless {
        center: Coord,
        #[serde(default)]
        reason: String,
    },
    /// Turn a tile's terrain sacred
    Sanctify {
        target: Coord,
        #[serde(default)]
        reason: String,
    },
    /// Watch and speak, change nothing
    Observe {
        #[serde(default)]
        reason: String,
    },
}

impl PrivilegedAction {
    pub fn reason(&self) -> &str {
        match self {
            Self::Smite { reason, .. }
            | Self::Bless { reason, .. }
            | Self::Sanctify { reason, .. }
            | Self::Observe { reason } => reason,
        }
    }

    pub fn target(&self) -> Option<Coord> {
        match self {
            Self::Smite { center, .. } | Self::Bless { center, .. } => Some(*center),
            Self::Sanctify { target, .. } => Some(*target),
            Self::Observe { .. } => None,
        }
    }

    /// Tiles the act touches, clipped to the board
    pub fn area(&self) -> Vec<Coord> {
        match self {
            Self::Smite { center, .. } | Self::Bless { center, .. } => center.area().collect(),
            Self::Sanctify { target, .. } => {
                if target.in_bounds() {
                    vec![*target]
                } else {
                    Vec::new()
                }
            }
            Self::Observe { .. } => Vec::new(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Smite { .. } => ActionKind::Smite,
            Self::Bless { .. } => ActionKind::Bless,
            Self::Sanctify { .. } => ActionKind::Sanctify,
            Self::Observe { .. } => ActionKind::Observe,
        }
    }
}

impl fmt::Display for PrivilegedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smite { center, .. } => write!(f, "smite at {}", center),
            Self::Bless { center, .. } => write!(f, "blessing at {}", center),
            Self::Sanctify { target, .. } => write!(f, "sanctification of {}", target),
            Self::Observe { .. } => f.write_str("observation"),
        }?;
        if !self.reason().is_empty() {
            write!(f, ": {}", self.reason())?;
        }
        Ok(())
    }
}

/// Any action, as stored in history and replayed by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "action", rename_all = "snake_case")]
pub enum Action {
    Faction(FactionAction),
    Privileged(PrivilegedAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Faction(a) => a.kind(),
            Self::Privileged(a) => a.kind(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Faction(a) => a.reason(),
            Self::Privileged(a) => a.reason(),
        }
    }
}

impl From<FactionAction> for Action {
    fn from(a: FactionAction) -> Self {
        Self::Faction(a)
    }
}

impl From<PrivilegedAction> for Action {
    fn from(a: PrivilegedAction) -> Self {
        Self::Privileged(a)
    }
}

/// Discriminant-only view of [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Recruit,
    Move,
    Convert,
    Construct,
    Message,
    Smite,
    Bless,
    Sanctify,
    Observe,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::Recruit,
        ActionKind::Move,
        ActionKind::Convert,
        ActionKind::Construct,
        ActionKind::Message,
        ActionKind::Smite,
        ActionKind::Bless,
        ActionKind::Sanctify,
        ActionKind::Observe,
    ];

    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::Smite | Self::Bless | Self::Sanctify | Self::Observe
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_action_deserialization() {
        let json = r#"{"type": "move", "from": {"x": 1, "y": 1}, "to": {"x": 2, "y": 1}, "count": 4, "reason": "push east"}"#;
        let action: FactionAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            FactionAction::Move {
                from: Coord::new(1, 1),
                to: Coord::new(2, 1),
                count: 4,
                reason: "push east".into(),
            }
        );
        assert_eq!(action.target(), Some(Coord::new(2, 1)));
    }

    #[test]
    fn test_reason_defaults_to_empty() {
        let json = r#"{"type": "construct", "at": {"x": 0, "y": 0}, "building": "tower"}"#;
        let action: FactionAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.reason(), "");
        assert_eq!(action.kind(), ActionKind::Construct);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type": "teleport", "at": {"x": 0, "y": 0}}"#;
        assert!(serde_json::from_str::<FactionAction>(json).is_err());
    }

    #[test]
    fn test_privileged_area_clipped() {
        let smite = PrivilegedAction::Smite {
            center: Coord::new(0, 9),
            reason: String::new(),
        };
        assert_eq!(smite.area().len(), 4);
        let sanctify = PrivilegedAction::Sanctify {
            target: Coord::new(12, 0),
            reason: String::new(),
        };
        assert!(sanctify.area().is_empty());
    }

    #[test]
    fn test_action_envelope() {
        let action = Action::from(PrivilegedAction::Observe {
            reason: "watching".into(),
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["category"], "privileged");
        assert_eq!(json["action"]["type"], "observe");
    }

    #[test]
    fn test_kinds_cover_every_variant() {
        let privileged = ActionKind::ALL.iter().filter(|k| k.is_privileged()).count();
        assert_eq!(privileged, 4);
        assert_eq!(ActionKind::ALL.len() - privileged, 5);
    }
}
