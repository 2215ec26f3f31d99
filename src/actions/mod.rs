//! Action catalogue and change records

pub mod action;
pub mod record;

pub use action::{Action, ActionKind, FactionAction, PrivilegedAction};
pub use record::{BattleReport, ChangeRecord, Outcome, Rejection};
