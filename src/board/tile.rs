//! Tiles, terrain and buildings

use serde::{Deserialize, Serialize};

use crate::board::faction::Resource;
use crate::board::MAX_TROOPS;
use crate::core::types::{Coord, FactionId};

/// Terrain affects both income and defense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Plains,
    Forest,
    Mountain,
    /// Produced by the observer's sanctification. Yields faith instead of material.
    Sacred,
}

impl Terrain {
    /// Per-round yield of an owned tile with this terrain
    pub fn income(&self) -> Yield {
        match self {
            Self::Plains => Yield::new(1, 0),
            Self::Forest => Yield::new(2, 0),
            Self::Mountain => Yield::new(1, 0),
            Self::Sacred => Yield::new(0, 2),
        }
    }

    /// Flat defense added before building multipliers
    pub fn defense_bonus(&self) -> f32 {
        match self {
            Self::Plains => 0.0,
            Self::Forest => 1.0,
            Self::Mountain => 3.0,
            Self::Sacred => 1.0,
        }
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Self::Plains
    }
}

/// At most one building stands on a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Building {
    Farm,
    Temple,
    Barracks,
    Tower,
    Fortress,
}

impl Building {
    pub const ALL: [Building; 5] = [
        Building::Farm,
        Building::Temple,
        Building::Barracks,
        Building::Tower,
        Building::Fortress,
    ];

    /// Fixed construction cost
    pub fn cost(&self) -> &'static [(Resource, u32)] {
        match self {
            Self::Farm => &[(Resource::Material, 5)],
            Self::Temple => &[(Resource::Material, 6), (Resource::Faith, 2)],
            Self::Barracks => &[(Resource::Material, 6)],
            Self::Tower => &[(Resource::Material, 6)],
            Self::Fortress => &[(Resource::Material, 12)],
        }
    }

    pub fn income(&self) -> Yield {
        match self {
            Self::Farm => Yield::new(2, 0),
            Self::Temple => Yield::new(0, 2),
            _ => Yield::default(),
        }
    }

    /// Multiplicative defense bonus, so investment compounds with garrison size
    pub fn defense_multiplier(&self) -> f32 {
        match self {
            Self::Fortress => 1.5,
            Self::Tower => 1.25,
            _ => 1.0,
        }
    }

    /// Extra troops granted per recruit action on this tile
    pub fn recruit_bonus(&self) -> u32 {
        match self {
            Self::Barracks => 1,
            _ => 0,
        }
    }
}

/// Resources produced per round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Yield {
    pub material: u32,
    pub faith: u32,
}

impl Yield {
    pub fn new(material: u32, faith: u32) -> Self {
        Self { material, faith }
    }
}

impl std::ops::Add for Yield {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            material: self.material + rhs.material,
            faith: self.faith + rhs.faith,
        }
    }
}

impl std::ops::AddAssign for Yield {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A single board cell
///
/// Owner and troop count are only writable from inside the crate; the
/// resolver is the one component that changes them during play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: Coord,
    pub terrain: Terrain,
    owner: Option<FactionId>,
    troops: u32,
    building: Option<Building>,
}

impl Tile {
    pub fn new(coord: Coord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            owner: None,
            troops: 0,
            building: None,
        }
    }

    /// None means neutral
    pub fn owner(&self) -> Option<&FactionId> {
        self.owner.as_ref()
    }

    pub fn is_owned_by(&self, faction: &FactionId) -> bool {
        self.owner.as_ref() == Some(faction)
    }

    pub fn troops(&self) -> u32 {
        self.troops
    }

    pub fn building(&self) -> Option<Building> {
        self.building
    }

    pub fn income(&self) -> Yield {
        let base = self.terrain.income();
        match self.building {
            Some(b) => base + b.income(),
            None => base,
        }
    }

    pub fn defense_multiplier(&self) -> f32 {
        self.building.map(|b| b.defense_multiplier()).unwrap_or(1.0)
    }

    pub(crate) fn set_owner(&mut self, owner: Option<FactionId>) {
        self.owner = owner;
    }

    /// Clamps into [0, MAX_TROOPS]
    pub(crate) fn set_troops(&mut self, troops: u32) {
        self.troops = troops.min(MAX_TROOPS);
    }

    pub(crate) fn set_building(&mut self, building: Option<Building>) {
        self.building = building;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_troops_clamped() {
        let mut tile = Tile::new(Coord::new(0, 0), Terrain::Plains);
        tile.set_troops(MAX_TROOPS + 20);
        assert_eq!(tile.troops(), MAX_TROOPS);
    }

    #[test]
    fn test_income_combines_terrain_and_building() {
        let mut tile = Tile::new(Coord::new(1, 1), Terrain::Forest);
        assert_eq!(tile.income(), Yield::new(2, 0));
        tile.set_building(Some(Building::Temple));
        assert_eq!(tile.income(), Yield::new(2, 2));
    }

    #[test]
    fn test_defense_multipliers() {
        assert_eq!(Building::Fortress.defense_multiplier(), 1.5);
        assert_eq!(Building::Tower.defense_multiplier(), 1.25);
        assert_eq!(Building::Farm.defense_multiplier(), 1.0);
    }

    #[test]
    fn test_building_serialization() {
        let json = serde_json::to_string(&Building::Fortress).unwrap();
        assert_eq!(json, "\"fortress\"");
        let b: Building = serde_json::from_str("\"barracks\"").unwrap();
        assert_eq!(b, Building::Barracks);
    }
}
