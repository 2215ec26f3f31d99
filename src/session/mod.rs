//! Game sessions
//!
//! A session is one game: the orchestrator task plus the handles used to
//! talk to it. Sessions share nothing, so any number can run side by side.

pub mod gate;
pub mod interrupt;
pub mod orchestrator;
pub mod stats;

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actions::{ChangeRecord, PrivilegedAction};
use crate::agents::{DecisionProvider, EnrichmentService, FlavorBook, FlavorState, StaticEnrichment};
use crate::board::{GameState, GameStatus};
use crate::core::config::GameConfig;
use crate::core::error::{GameError, Result};
use crate::core::types::{FactionId, SessionId};
use crate::transport::messages::ServerMessage;

pub use gate::EnrichmentGate;
pub use interrupt::InterruptionController;
pub use orchestrator::{Session, TurnPhase};
pub use stats::{FactionStats, TurnStats};

use orchestrator::Command;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

struct Seat {
    id: FactionId,
    flavor: FlavorState,
    provider: Arc<dyn DecisionProvider>,
}

/// Start-game control surface: participants with their flavor seeds and
/// decision providers
pub struct SessionBuilder {
    config: GameConfig,
    seats: Vec<Seat>,
    enrichment: Arc<dyn EnrichmentService>,
    board: Option<GameState>,
}

impl SessionBuilder {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            seats: Vec::new(),
            enrichment: Arc::new(StaticEnrichment::new()),
            board: None,
        }
    }

    /// Add a participant. Turn order follows the order of these calls.
    pub fn participant(
        mut self,
        id: impl Into<FactionId>,
        flavor_seed: impl Into<String>,
        provider: Arc<dyn DecisionProvider>,
    ) -> Self {
        self.seats.push(Seat {
            id: id.into(),
            flavor: FlavorState::new(flavor_seed),
            provider,
        });
        self
    }

    pub fn enrichment(mut self, service: Arc<dyn EnrichmentService>) -> Self {
        self.enrichment = service;
        self
    }

    /// Play on a prepared board instead of a generated one. The board must
    /// still be in setup and list the same participants in the same order.
    pub fn board(mut self, board: GameState) -> Self {
        self.board = Some(board);
        self
    }

    /// Spawn the orchestrator. Must be called inside a tokio runtime.
    pub fn start(self) -> Result<RunningSession> {
        self.config.validate()?;
        let ids: Vec<FactionId> = self.seats.iter().map(|s| s.id.clone()).collect();

        let state = match self.board {
            Some(board) => {
                if board.status != GameStatus::Setup {
                    return Err(GameError::InvalidSetup("board already started".into()));
                }
                if board.participants != ids {
                    return Err(GameError::InvalidSetup(
                        "board participants do not match the seats".into(),
                    ));
                }
                board
            }
            None => GameState::generate(&ids, &self.config)?,
        };

        let mut providers = BTreeMap::new();
        let mut flavor = FlavorBook::new();
        for seat in self.seats {
            flavor.insert(seat.id.clone(), seat.flavor);
            providers.insert(seat.id, seat.provider);
        }

        let id = state.session;
        let (events_tx, events) = broadcast::channel(EVENT_BUFFER);
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal) = mpsc::unbounded_channel();

        let session = Session::new(
            self.config,
            state,
            providers,
            self.enrichment,
            flavor,
            events_tx.clone(),
            internal_tx,
        );
        let task = tokio::spawn(session.run(commands, internal));

        Ok(RunningSession {
            handle: SessionHandle {
                id,
                commands: commands_tx,
                events: events_tx,
            },
            events,
            task,
        })
    }
}

/// A spawned session. `events` was subscribed before the first turn began,
/// so it sees every message.
pub struct RunningSession {
    pub handle: SessionHandle,
    pub events: broadcast::Receiver<ServerMessage>,
    pub task: JoinHandle<()>,
}

/// Cheap, cloneable access to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ServerMessage>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)
    }

    /// Apply an observer act. A rejected act comes back as a record with a
    /// rejection outcome, not as an error.
    pub async fn privileged(&self, action: PrivilegedAction) -> Result<ChangeRecord> {
        self.request(|reply| Command::Privileged { action, reply }).await
    }

    /// The client finished animating batch `seq`. Ignored unless `seq` is
    /// the newest batch.
    pub async fn acknowledge(&self, seq: u64) -> Result<()> {
        self.commands
            .send(Command::AnimationComplete { seq })
            .await
            .map_err(|_| GameError::SessionClosed)
    }

    /// Current state plus the batch still awaiting acknowledgement, if any
    pub async fn snapshot(&self) -> Result<ServerMessage> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// A client lost its view. Returns the snapshot for that client alone;
    /// the session keeps waiting for whatever it was waiting for.
    pub async fn client_reloaded(&self) -> Result<ServerMessage> {
        tracing::debug!(session = %self.id, "client reloaded");
        self.snapshot().await
    }

    pub async fn state(&self) -> Result<GameState> {
        self.request(|reply| Command::State { reply }).await
    }

    pub async fn history(&self) -> Result<Vec<ChangeRecord>> {
        self.request(|reply| Command::History { reply }).await
    }

    pub async fn stats(&self) -> Result<TurnStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn phase(&self) -> Result<TurnPhase> {
        self.request(|reply| Command::Phase { reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}
