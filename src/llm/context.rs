//! Turn context rendered as prompt text
//!
//! Builds a compact, model-readable summary of what a faction can see at the
//! start of its turn: the terrain map, territory, resources, what the
//! observer has recently done, and how its last orders went.

use std::fmt::Write;

use crate::agents::TurnContext;
use crate::board::{GameState, Terrain};
use crate::core::types::{Coord, FactionId, BOARD_SIZE};

/// Owned-tile rows shown per faction before truncating
const MAX_TILE_ROWS: usize = 30;

#[derive(Debug, Clone)]
pub struct PromptContext {
    pub faction: FactionId,
    pub round: u32,
    pub personality: String,
    pub memories: Vec<String>,
    pub material: u32,
    pub faith: u32,
    pub terrain_map: String,
    /// One line per faction: name, tiles, troops
    pub standings: Vec<String>,
    /// One line per owned tile of the acting faction
    pub territory: Vec<String>,
    pub interventions: Vec<String>,
    pub feedback: Vec<String>,
    pub inbox: Vec<String>,
}

impl PromptContext {
    pub fn from_turn(context: &TurnContext) -> Self {
        let board = &context.board;
        let standings = board
            .participants
            .iter()
            .map(|id| {
                format!(
                    "{}{}: {} tiles, {} troops",
                    id,
                    if *id == context.faction { " (you)" } else { "" },
                    board.tile_count(id),
                    board.troop_total(id)
                )
            })
            .collect();

        let territory = board
            .tiles_of(&context.faction)
            .take(MAX_TILE_ROWS)
            .map(|t| {
                let building = t
                    .building()
                    .map(|b| format!(", {:?}", b).to_lowercase())
                    .unwrap_or_default();
                format!("{} {:?}, {} troops{}", t.coord, t.terrain, t.troops(), building)
            })
            .collect();

        Self {
            faction: context.faction.clone(),
            round: context.round,
            personality: context.flavor.personality.clone(),
            memories: context.flavor.memories.clone(),
            material: context.material(),
            faith: context.faith(),
            terrain_map: render_map(board, &context.faction),
            standings,
            territory,
            interventions: context
                .interventions
                .iter()
                .map(|i| format!("round {}: {}", i.round, i.summary))
                .collect(),
            feedback: context.feedback.clone(),
            inbox: context
                .inbox
                .iter()
                .map(|(from, text)| format!("from {}: {}", from, text))
                .collect(),
        }
    }

    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "You are {}. Round {}.", self.faction, self.round);
        if !self.personality.is_empty() {
            let _ = writeln!(s, "Personality: {}", self.personality);
        }
        let _ = writeln!(s, "Material: {}  Faith: {}", self.material, self.faith);

        section(&mut s, "Memories of the gods", &self.memories);
        section(&mut s, "Standings", &self.standings);
        section(&mut s, "Your territory", &self.territory);

        let _ = writeln!(
            s,
            "\nMap (row = y, column = x; your tiles '@', rival tiles '#', \
             otherwise P plains, F forest, M mountain, S sacred):"
        );
        s.push_str(&self.terrain_map);

        section(&mut s, "Recent divine interventions", &self.interventions);
        section(&mut s, "Results of your last orders", &self.feedback);
        section(&mut s, "Messages received", &self.inbox);
        s
    }
}

fn section(s: &mut String, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(s, "\n{}:", title);
    for line in lines {
        let _ = writeln!(s, "- {}", line);
    }
}

fn render_map(board: &GameState, me: &FactionId) -> String {
    let mut map = String::new();
    for y in 0..BOARD_SIZE {
        for x in 0..BOARD_SIZE {
            let glyph = match board.tile(Coord::new(x, y)) {
                Some(t) if t.is_owned_by(me) => '@',
                Some(t) if t.owner().is_some() => '#',
                Some(t) => match t.terrain {
                    Terrain::Plains => 'P',
                    Terrain::Forest => 'F',
                    Terrain::Mountain => 'M',
                    Terrain::Sacred => 'S',
                },
                None => '?',
            };
            map.push(glyph);
        }
        map.push('\n');
    }
    map
}
