//! Game state: the board, the factions and the turn bookkeeping

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::actions::{ChangeRecord, PrivilegedAction};
use crate::board::faction::{Faction, Ledger, Resource};
use crate::board::tile::{Building, Terrain, Tile, Yield};
use crate::board::{MAX_FACTIONS, MAX_TROOPS};
use crate::core::config::GameConfig;
use crate::core::error::{GameError, Result};
use crate::core::types::{Coord, FactionId, SessionId, BOARD_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Setup,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryKind {
    /// Only one faction still owns territory
    Elimination,
    /// The round ceiling was reached; most tiles wins
    TurnLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victory {
    pub winner: FactionId,
    pub kind: VictoryKind,
}

/// An observer intervention as seen by decision providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub round: u32,
    pub action: PrivilegedAction,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub session: SessionId,
    /// Row-major, BOARD_SIZE * BOARD_SIZE
    tiles: Vec<Tile>,
    pub factions: BTreeMap<FactionId, Faction>,
    /// Turn order. The observer is never in here.
    pub participants: Vec<FactionId>,
    pub current: usize,
    /// Starts at 1, incremented when the turn order wraps
    pub round: u32,
    /// Number of turns that have begun (replays excluded)
    pub turn: u32,
    pub status: GameStatus,
    pub victory: Option<Victory>,
    #[serde(skip)]
    history: Vec<ChangeRecord>,
    interventions: VecDeque<Intervention>,
    intervention_cap: usize,
    income_round: Option<u32>,
}

impl GameState {
    /// All-plains neutral board with starting resources but no territory.
    /// The state stays in `Setup` until [`GameState::start`].
    pub fn empty(participants: &[FactionId], config: &GameConfig) -> Result<Self> {
        if participants.len() < 2 || participants.len() > MAX_FACTIONS {
            return Err(GameError::InvalidSetup(format!(
                "need 2..={} participants, got {}",
                MAX_FACTIONS,
                participants.len()
            )));
        }
        let mut factions = BTreeMap::new();
        for id in participants {
            if id.as_str().is_empty() {
                return Err(GameError::InvalidSetup("empty faction name".into()));
            }
            let faction = Faction::new(
                id.clone(),
                Ledger::with(config.starting_material, config.starting_faith),
            );
            if factions.insert(id.clone(), faction).is_some() {
                return Err(GameError::InvalidSetup(format!("duplicate faction {}", id)));
            }
        }

        let mut tiles = Vec::with_capacity((BOARD_SIZE * BOARD_SIZE) as usize);
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                tiles.push(Tile::new(Coord::new(x, y), Terrain::Plains));
            }
        }

        Ok(Self {
            session: SessionId::new(),
            tiles,
            factions,
            participants: participants.to_vec(),
            current: 0,
            round: 1,
            turn: 0,
            status: GameStatus::Setup,
            victory: None,
            history: Vec::new(),
            interventions: VecDeque::new(),
            intervention_cap: config.intervention_log_len,
            income_round: None,
        })
    }

    /// Seeded terrain with each faction holding one corner
    pub fn generate(participants: &[FactionId], config: &GameConfig) -> Result<Self> {
        let mut state = Self::empty(participants, config)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        for tile in &mut state.tiles {
            let roll: f32 = rng.gen();
            tile.terrain = if roll < 0.5 {
                Terrain::Plains
            } else if roll < 0.75 {
                Terrain::Forest
            } else if roll < 0.95 {
                Terrain::Mountain
            } else {
                Terrain::Sacred
            };
        }

        let last = BOARD_SIZE - 1;
        let corners = [
            Coord::new(0, 0),
            Coord::new(last, last),
            Coord::new(last, 0),
            Coord::new(0, last),
        ];
        for (id, corner) in participants.iter().zip(corners) {
            if let Some(tile) = state.tile_mut(corner) {
                tile.terrain = Terrain::Plains;
            }
            state.setup_tile(corner, Some(id.clone()), config.starting_troops, None)?;
        }
        Ok(state)
    }

    /// Place territory during setup. Fails once the game has started.
    pub fn setup_tile(
        &mut self,
        coord: Coord,
        owner: Option<FactionId>,
        troops: u32,
        building: Option<Building>,
    ) -> Result<()> {
        self.ensure_setup()?;
        if let Some(id) = &owner {
            if !self.factions.contains_key(id) {
                return Err(GameError::UnknownFaction(id.clone()));
            }
        }
        let tile = self.tile_mut(coord).ok_or(GameError::InvalidCoord(coord))?;
        tile.set_owner(owner);
        tile.set_troops(troops.min(MAX_TROOPS));
        tile.set_building(building);
        Ok(())
    }

    pub fn setup_terrain(&mut self, coord: Coord, terrain: Terrain) -> Result<()> {
        self.ensure_setup()?;
        let tile = self.tile_mut(coord).ok_or(GameError::InvalidCoord(coord))?;
        tile.terrain = terrain;
        Ok(())
    }

    pub fn setup_resources(&mut self, faction: &FactionId, material: u32, faith: u32) -> Result<()> {
        self.ensure_setup()?;
        let f = self
            .factions
            .get_mut(faction)
            .ok_or_else(|| GameError::UnknownFaction(faction.clone()))?;
        f.ledger = Ledger::with(material, faith);
        Ok(())
    }

    fn ensure_setup(&self) -> Result<()> {
        if self.status != GameStatus::Setup {
            return Err(GameError::InvalidSetup("game already started".into()));
        }
        Ok(())
    }

    /// Setup -> Active
    pub fn start(&mut self) {
        if self.status == GameStatus::Setup {
            self.status = GameStatus::Active;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    pub(crate) fn finish(&mut self, victory: Victory) {
        for faction in self.factions.values_mut() {
            faction.active = false;
        }
        self.status = GameStatus::Finished;
        self.victory = Some(victory);
    }

    // === LOOKUP ===

    fn index(coord: Coord) -> Option<usize> {
        coord
            .in_bounds()
            .then(|| (coord.y * BOARD_SIZE + coord.x) as usize)
    }

    /// None outside the board
    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        Self::index(coord).and_then(|i| self.tiles.get(i))
    }

    pub(crate) fn tile_mut(&mut self, coord: Coord) -> Option<&mut Tile> {
        Self::index(coord).and_then(move |i| self.tiles.get_mut(i))
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Symmetric; false if either coordinate is off the board
    pub fn adjacent(&self, a: Coord, b: Coord) -> bool {
        a.in_bounds() && b.in_bounds() && a.is_adjacent(&b)
    }

    pub fn neighbors(&self, coord: Coord) -> impl Iterator<Item = &Tile> {
        coord.neighbors().filter_map(move |c| self.tile(c))
    }

    pub fn tiles_of<'a>(&'a self, faction: &'a FactionId) -> impl Iterator<Item = &'a Tile> + 'a {
        self.tiles.iter().filter(move |t| t.is_owned_by(faction))
    }

    pub fn tile_count(&self, faction: &FactionId) -> usize {
        self.tiles_of(faction).count()
    }

    pub fn troop_total(&self, faction: &FactionId) -> u32 {
        self.tiles_of(faction).map(Tile::troops).sum()
    }

    pub fn faction(&self, id: &FactionId) -> Option<&Faction> {
        self.factions.get(id)
    }

    pub(crate) fn faction_mut(&mut self, id: &FactionId) -> Option<&mut Faction> {
        self.factions.get_mut(id)
    }

    pub fn current_participant(&self) -> Option<&FactionId> {
        self.participants.get(self.current)
    }

    pub fn is_alive(&self, faction: &FactionId) -> bool {
        self.tiles.iter().any(|t| t.is_owned_by(faction))
    }

    // === HISTORY ===

    pub fn history(&self) -> &[ChangeRecord] {
        &self.history
    }

    /// Copy of the board without the change history, for handing out
    pub fn snapshot(&self) -> Self {
        Self {
            session: self.session,
            tiles: self.tiles.clone(),
            factions: self.factions.clone(),
            participants: self.participants.clone(),
            current: self.current,
            round: self.round,
            turn: self.turn,
            status: self.status,
            victory: self.victory.clone(),
            history: Vec::new(),
            interventions: self.interventions.clone(),
            intervention_cap: self.intervention_cap,
            income_round: self.income_round,
        }
    }

    pub(crate) fn record(&mut self, record: ChangeRecord) {
        self.history.push(record);
    }

    pub fn interventions(&self) -> impl Iterator<Item = &Intervention> {
        self.interventions.iter()
    }

    pub(crate) fn log_intervention(&mut self, action: PrivilegedAction, summary: String) {
        self.interventions.push_back(Intervention {
            round: self.round,
            action,
            summary,
        });
        while self.interventions.len() > self.intervention_cap {
            self.interventions.pop_front();
        }
    }

    // === TURN ORDER ===

    pub(crate) fn set_active(&mut self, participant: usize) {
        let active = self.participants.get(participant).cloned();
        for faction in self.factions.values_mut() {
            faction.active = Some(&faction.id) == active.as_ref();
        }
    }

    /// Move to the next participant that still owns territory.
    /// Returns true if the order wrapped and a new round began.
    pub(crate) fn advance(&mut self) -> bool {
        let n = self.participants.len();
        let mut wrapped = false;
        let mut next = self.current;
        for _ in 0..n {
            next = (next + 1) % n;
            if next == 0 {
                wrapped = true;
            }
            if self.is_alive(&self.participants[next]) {
                break;
            }
        }
        self.current = next;
        if wrapped {
            self.round += 1;
        }
        wrapped
    }

    // === ECONOMY ===

    /// Credit passive income at most once per round.
    ///
    /// The grid is scanned once and totals are accumulated per faction before
    /// any ledger is touched. Returns the credited totals, or None if income
    /// was already paid this round.
    pub(crate) fn collect_income(&mut self) -> Option<BTreeMap<FactionId, Yield>> {
        if self.income_round == Some(self.round) {
            return None;
        }
        self.income_round = Some(self.round);

        let mut totals: BTreeMap<FactionId, Yield> = BTreeMap::new();
        for tile in &self.tiles {
            if let Some(owner) = tile.owner() {
                *totals.entry(owner.clone()).or_default() += tile.income();
            }
        }
        for (id, amount) in &totals {
            if let Some(faction) = self.factions.get_mut(id) {
                faction.ledger.credit(Resource::Material, amount.material);
                faction.ledger.credit(Resource::Faith, amount.faith);
            }
        }
        Some(totals)
    }

    // === VICTORY ===

    /// Elimination first; the round ceiling only if nobody was eliminated
    pub fn check_victory(&self, max_rounds: u32) -> Option<Victory> {
        let alive: Vec<&FactionId> = self
            .participants
            .iter()
            .filter(|id| self.is_alive(id))
            .collect();
        if alive.len() == 1 {
            return Some(Victory {
                winner: alive[0].clone(),
                kind: VictoryKind::Elimination,
            });
        }

        if self.round > max_rounds {
            // Ties go to the higher troop total, then to turn order
            let mut best: Option<(&FactionId, usize, u32)> = None;
            for id in &self.participants {
                let tiles = self.tile_count(id);
                let troops = self.troop_total(id);
                let better = match best {
                    None => true,
                    Some((_, bt, btr)) => (tiles, troops) > (bt, btr),
                };
                if better {
                    best = Some((id, tiles, troops));
                }
            }
            return best.map(|(id, _, _)| Victory {
                winner: id.clone(),
                kind: VictoryKind::TurnLimit,
            });
        }

        None
    }
}
