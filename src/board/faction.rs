//! Factions and their resource ledgers

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::FactionId;

/// Fungible counters a faction spends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Material,
    Faith,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material => f.write_str("material"),
            Self::Faith => f.write_str("faith"),
        }
    }
}

/// The first resource a cost could not be covered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub resource: Resource,
    pub have: u32,
    pub need: u32,
}

/// Resource balances. Counters are unsigned and every debit is checked
/// against the whole cost before anything is removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    balances: AHashMap<Resource, u32>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(material: u32, faith: u32) -> Self {
        let mut ledger = Self::new();
        ledger.credit(Resource::Material, material);
        ledger.credit(Resource::Faith, faith);
        ledger
    }

    pub fn get(&self, resource: Resource) -> u32 {
        self.balances.get(&resource).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, resource: Resource, amount: u32) {
        let entry = self.balances.entry(resource).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Check a (possibly multi-resource) cost without mutating
    pub fn check(&self, cost: &[(Resource, u32)]) -> Result<(), Shortfall> {
        for &(resource, need) in cost {
            let have = self.get(resource);
            if have < need {
                return Err(Shortfall {
                    resource,
                    have,
                    need,
                });
            }
        }
        Ok(())
    }

    pub fn can_afford(&self, cost: &[(Resource, u32)]) -> bool {
        self.check(cost).is_ok()
    }

    /// Debit the full cost, or nothing at all
    pub fn debit(&mut self, cost: &[(Resource, u32)]) -> Result<(), Shortfall> {
        self.check(cost)?;
        for &(resource, amount) in cost {
            if let Some(balance) = self.balances.get_mut(&resource) {
                *balance -= amount;
            }
        }
        Ok(())
    }
}

/// A turn participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub ledger: Ledger,
    /// True while it is this faction's turn
    pub active: bool,
}

impl Faction {
    pub fn new(id: FactionId, ledger: Ledger) -> Self {
        Self {
            id,
            ledger,
            active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_all_or_nothing() {
        let mut ledger = Ledger::with(10, 1);
        let cost = [(Resource::Material, 5), (Resource::Faith, 2)];

        let err = ledger.debit(&cost).unwrap_err();
        assert_eq!(err.resource, Resource::Faith);
        assert_eq!(err.need, 2);
        // Nothing was taken
        assert_eq!(ledger.get(Resource::Material), 10);
        assert_eq!(ledger.get(Resource::Faith), 1);

        ledger.credit(Resource::Faith, 1);
        assert!(ledger.debit(&cost).is_ok());
        assert_eq!(ledger.get(Resource::Material), 5);
        assert_eq!(ledger.get(Resource::Faith), 0);
    }

    #[test]
    fn test_missing_resource_reads_zero() {
        let ledger = Ledger::new();
        assert_eq!(ledger.get(Resource::Faith), 0);
        assert!(!ledger.can_afford(&[(Resource::Faith, 1)]));
        assert!(ledger.can_afford(&[]));
    }

    #[test]
    fn test_ledger_serialization() {
        let ledger = Ledger::with(3, 4);
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["balances"]["material"], 3);
        assert_eq!(json["balances"]["faith"], 4);
    }
}
