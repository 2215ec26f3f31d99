//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Width and height of the square board
pub const BOARD_SIZE: i32 = 10;

/// Grid position. Signed so that neighbor arithmetic at the edges can
/// produce (and then reject) out-of-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True if the coordinate lies inside [0, BOARD_SIZE) on both axes
    pub fn in_bounds(&self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.y)
    }

    pub fn manhattan(&self, other: &Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// 4-directional adjacency, no diagonals
    pub fn is_adjacent(&self, other: &Coord) -> bool {
        self.manhattan(other) == 1
    }

    /// The four orthogonal neighbors that are on the board
    pub fn neighbors(&self) -> impl Iterator<Item = Coord> {
        let c = *self;
        [(0, -1), (1, 0), (0, 1), (-1, 0)]
            .into_iter()
            .map(move |(dx, dy)| Coord::new(c.x + dx, c.y + dy))
            .filter(Coord::in_bounds)
    }

    /// The 3x3 block centred on this coordinate, clipped to the board
    pub fn area(&self) -> impl Iterator<Item = Coord> {
        let c = *self;
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| Coord::new(c.x + dx, c.y + dy)))
            .filter(Coord::in_bounds)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Faction identity. Names are unique and stable for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub String);

impl FactionId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Who issued an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "faction", rename_all = "snake_case")]
pub enum Actor {
    Faction(FactionId),
    Observer,
}

/// Identifier for a privileged intervention, used to key enrichment work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier for a game session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_bounds() {
        assert!(Coord::new(0, 0).in_bounds());
        assert!(Coord::new(9, 9).in_bounds());
        assert!(!Coord::new(10, 0).in_bounds());
        assert!(!Coord::new(-1, 5).in_bounds());
    }

    #[test]
    fn test_adjacency_is_orthogonal_only() {
        let c = Coord::new(4, 4);
        assert!(c.is_adjacent(&Coord::new(4, 5)));
        assert!(c.is_adjacent(&Coord::new(3, 4)));
        assert!(!c.is_adjacent(&Coord::new(5, 5)));
        assert!(!c.is_adjacent(&c));
    }

    #[test]
    fn test_corner_neighbors_clipped() {
        let n: Vec<_> = Coord::new(0, 0).neighbors().collect();
        assert_eq!(n.len(), 2);
        assert!(n.contains(&Coord::new(1, 0)));
        assert!(n.contains(&Coord::new(0, 1)));
    }

    #[test]
    fn test_area_clipped_at_edge() {
        assert_eq!(Coord::new(5, 5).area().count(), 9);
        assert_eq!(Coord::new(0, 0).area().count(), 4);
        assert_eq!(Coord::new(9, 4).area().count(), 6);
    }

    #[test]
    fn test_actor_serialization() {
        let json = serde_json::to_string(&Actor::Observer).unwrap();
        assert_eq!(json, r#"{"kind":"observer"}"#);
        let json = serde_json::to_string(&Actor::Faction("Red".into())).unwrap();
        assert_eq!(json, r#"{"kind":"faction","faction":"Red"}"#);
    }
}
