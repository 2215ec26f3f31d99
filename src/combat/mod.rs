//! Combat resolution for contested moves

pub mod arbiter;

pub use arbiter::{defense_strength, effective_troops, resolve_attack, CombatResult};
