//! Turn orchestrator
//!
//! One task owns the [`GameState`] and runs [`Session::run`]. Everything that
//! can happen to a session arrives as a message: commands from handles
//! (observer acts, acknowledgements, queries) and internal completions
//! (decisions, enrichment results, settle timers). Commands are polled first,
//! so an observer act that races a decision result is always handled before
//! the result is looked at.
//!
//! Phases:
//!
//! ```text
//! Idle -> AwaitingDecision -> ApplyingActions -> AwaitingAnimationAck -> Idle (advance)
//!              |
//!              +-> Aborted (observer act) -> AwaitingAnimationAck -> AwaitingDecision (replay)
//! ```
//!
//! `ApplyingActions` and `Aborted` are transient. Both are left within the
//! same step that entered them, so `phase()` never reports either.
//!
//! Every broadcast batch carries a sequence number. An acknowledgement names
//! the last batch the client played and only counts if that is the newest
//! batch, so a late ack for an older batch never releases a newer one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::Instrument;

use crate::actions::{ChangeRecord, Outcome, PrivilegedAction};
use crate::agents::{
    Decision, DecisionProvider, EnrichmentService, FlavorBook, PrivilegedEvent, ProviderError,
    TurnContext,
};
use crate::board::{GameState, Victory};
use crate::core::config::GameConfig;
use crate::core::error::GameError;
use crate::core::types::{EventId, FactionId};
use crate::resolver::{affected_participants, Resolver};
use crate::session::gate::EnrichmentGate;
use crate::session::interrupt::InterruptionController;
use crate::session::stats::TurnStats;
use crate::transport::messages::ServerMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TurnPhase {
    /// Between turns: settling after an empty batch, held by the enrichment
    /// gate, or halted after victory
    Idle,
    AwaitingDecision {
        participant: FactionId,
        generation: u64,
    },
    ApplyingActions {
        participant: FactionId,
    },
    /// Broadcast batches waiting on a single client acknowledgement of the
    /// newest one
    AwaitingAnimationAck {
        batches: u32,
    },
    /// The in-flight decision was cancelled by an observer act. Replaced by
    /// `AwaitingAnimationAck` before the act returns.
    Aborted {
        participant: FactionId,
    },
}

/// Requests from [`crate::session::SessionHandle`]
#[derive(Debug)]
pub(crate) enum Command {
    Privileged {
        action: PrivilegedAction,
        reply: oneshot::Sender<ChangeRecord>,
    },
    AnimationComplete {
        seq: u64,
    },
    Snapshot {
        reply: oneshot::Sender<ServerMessage>,
    },
    State {
        reply: oneshot::Sender<GameState>,
    },
    History {
        reply: oneshot::Sender<Vec<ChangeRecord>>,
    },
    Stats {
        reply: oneshot::Sender<TurnStats>,
    },
    Phase {
        reply: oneshot::Sender<TurnPhase>,
    },
    Shutdown,
}

/// Completions reported back by tasks the session spawned
#[derive(Debug)]
pub(crate) enum Internal {
    Decision {
        generation: u64,
        participant: FactionId,
        result: Result<Decision, ProviderError>,
        elapsed: std::time::Duration,
    },
    Enriched {
        event: EventId,
        result: Result<FlavorBook, GameError>,
    },
    Settled {
        token: u64,
    },
}

/// What to do once nothing is holding the loop any more
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    /// The current participant's turn is over
    Advance,
    /// The current participant has not started its turn yet
    Start,
}

pub struct Session {
    config: GameConfig,
    state: GameState,
    resolver: Resolver,
    providers: BTreeMap<FactionId, Arc<dyn DecisionProvider>>,
    enrichment: Arc<dyn EnrichmentService>,
    flavor: FlavorBook,
    phase: TurnPhase,
    resume: Resume,
    /// Set while the current participant waits on the enrichment gate
    gated: bool,
    pending_settle: Option<u64>,
    settle_tokens: u64,
    /// Sequence number of the newest broadcast batch
    batch_seq: u64,
    interrupt: InterruptionController,
    gate: EnrichmentGate,
    stats: TurnStats,
    feedback: BTreeMap<FactionId, Vec<String>>,
    inbox: BTreeMap<FactionId, Vec<(FactionId, String)>>,
    events: broadcast::Sender<ServerMessage>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl Session {
    pub(crate) fn new(
        config: GameConfig,
        state: GameState,
        providers: BTreeMap<FactionId, Arc<dyn DecisionProvider>>,
        enrichment: Arc<dyn EnrichmentService>,
        flavor: FlavorBook,
        events: broadcast::Sender<ServerMessage>,
        internal_tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        Self {
            resolver: Resolver::new(config.seed),
            stats: TurnStats::new(&state.participants),
            config,
            state,
            providers,
            enrichment,
            flavor,
            phase: TurnPhase::Idle,
            resume: Resume::Start,
            gated: false,
            pending_settle: None,
            settle_tokens: 0,
            batch_seq: 0,
            interrupt: InterruptionController::new(),
            gate: EnrichmentGate::new(),
            feedback: BTreeMap::new(),
            inbox: BTreeMap::new(),
            events,
            internal_tx,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        tracing::info!(session = %self.state.session, "session started");
        self.state.start();
        self.begin_turn(false);

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(event) = internal.recv() => self.on_internal(event),
            }
        }

        if let Some(generation) = self.interrupt.in_flight() {
            self.interrupt.cancel(generation);
        }
        tracing::info!(session = %self.state.session, "session stopped");
    }

    pub fn phase(&self) -> &TurnPhase {
        &self.phase
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Privileged { action, reply } => {
                let record = self.on_privileged(action);
                let _ = reply.send(record);
            }
            Command::AnimationComplete { seq } => self.on_animation_complete(seq),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::State { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            Command::History { reply } => {
                let _ = reply.send(self.state.history().to_vec());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats.clone());
            }
            Command::Phase { reply } => {
                let _ = reply.send(self.phase.clone());
            }
            Command::Shutdown => {}
        }
    }

    fn on_internal(&mut self, event: Internal) {
        match event {
            Internal::Decision {
                generation,
                participant,
                result,
                elapsed,
            } => self.on_decision(generation, participant, result, elapsed),
            Internal::Enriched { event, result } => self.on_enriched(event, result),
            Internal::Settled { token } => self.on_settled(token),
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        // No subscribers is fine; clients catch up from a snapshot
        let _ = self.events.send(message);
    }

    // === TURN FLOW ===

    /// Enter `AwaitingDecision` for the current participant, unless the game
    /// is over or the enrichment gate holds it
    fn begin_turn(&mut self, replay: bool) {
        if self.state.is_finished() {
            self.phase = TurnPhase::Idle;
            return;
        }
        let Some(participant) = self.state.current_participant().cloned() else {
            self.phase = TurnPhase::Idle;
            return;
        };

        if self.gate.is_blocked(&participant) {
            tracing::debug!(faction = %participant, "waiting on enrichment");
            if replay {
                self.interrupt.request_restart();
            }
            self.phase = TurnPhase::Idle;
            self.resume = Resume::Start;
            self.gated = true;
            return;
        }
        self.gated = false;

        if let Some(income) = self.state.collect_income() {
            for (id, amount) in &income {
                tracing::debug!(faction = %id, material = amount.material, faith = amount.faith, "income");
            }
        }
        if !replay {
            self.state.turn += 1;
        }
        self.stats.turn_started(&participant, replay);
        self.state.set_active(self.state.current);

        let round = self.state.round;
        let span = tracing::info_span!("turn", faction = %participant, round);
        tracing::info!(parent: &span, turn = self.state.turn, replay, "turn started");
        self.broadcast(ServerMessage::TurnStarted {
            faction: participant.clone(),
            round,
            turn: self.state.turn,
            replay,
        });

        let (generation, cancel) = self.interrupt.begin();
        self.phase = TurnPhase::AwaitingDecision {
            participant: participant.clone(),
            generation,
        };

        let context = self.turn_context(&participant);
        let provider = self.providers.get(&participant).cloned();
        let timeout = self.config.decision_timeout();
        let tx = self.internal_tx.clone();
        tokio::spawn(
            async move {
                let started = Instant::now();
                let result = match provider {
                    None => Err(ProviderError::Failed("no provider registered".into())),
                    Some(provider) => {
                        match tokio::time::timeout(
                            timeout,
                            provider.request_turn(context, cancel.clone()),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => {
                                cancel.cancel();
                                Err(ProviderError::TimedOut)
                            }
                        }
                    }
                };
                let _ = tx.send(Internal::Decision {
                    generation,
                    participant,
                    result,
                    elapsed: started.elapsed(),
                });
            }
            .instrument(span),
        );
    }

    fn turn_context(&self, participant: &FactionId) -> TurnContext {
        TurnContext {
            faction: participant.clone(),
            round: self.state.round,
            turn: self.state.turn,
            board: self.state.snapshot(),
            interventions: self.state.interventions().cloned().collect(),
            feedback: self.feedback.get(participant).cloned().unwrap_or_default(),
            inbox: self.inbox.get(participant).cloned().unwrap_or_default(),
            flavor: self.flavor.get(participant).cloned().unwrap_or_default(),
        }
    }

    fn on_decision(
        &mut self,
        generation: u64,
        participant: FactionId,
        result: Result<Decision, ProviderError>,
        elapsed: std::time::Duration,
    ) {
        // Checked before anything is applied; a cancelled generation never
        // reaches the resolver
        if !self.interrupt.accept(generation) {
            tracing::debug!(faction = %participant, generation, "discarding stale decision");
            return;
        }

        let decision = match result {
            Ok(decision) => {
                self.stats.decision_answered(&participant, elapsed);
                decision
            }
            Err(ProviderError::TimedOut) => {
                tracing::warn!(faction = %participant, "decision timed out, passing the turn");
                self.stats.timed_out(&participant);
                Decision::default()
            }
            Err(e) => {
                tracing::warn!(faction = %participant, error = %e, "decision failed, passing the turn");
                self.stats.failed(&participant);
                Decision::default()
            }
        };
        self.apply_batch(participant, decision);
    }

    /// Apply a decision in submission order. Rejections are recorded and the
    /// batch carries on; victory stops it.
    fn apply_batch(&mut self, participant: FactionId, decision: Decision) {
        self.phase = TurnPhase::ApplyingActions {
            participant: participant.clone(),
        };
        self.inbox.remove(&participant);

        let mut records = Vec::with_capacity(decision.actions.len());
        let mut victory = None;
        for action in decision.actions {
            let record = self.resolver.apply(&mut self.state, &participant, action);
            tracing::debug!(
                faction = %participant,
                kind = ?record.action.kind(),
                success = record.success,
                "action resolved"
            );
            if let Outcome::MessageSent { to, text } = &record.outcome {
                self.inbox
                    .entry(to.clone())
                    .or_default()
                    .push((participant.clone(), text.clone()));
            }
            records.push(record);

            victory = self.state.check_victory(self.config.max_rounds);
            if victory.is_some() {
                break;
            }
        }

        self.stats.record_batch(&participant, &records);
        self.feedback
            .insert(participant.clone(), records.iter().map(ChangeRecord::feedback).collect());

        let empty = records.is_empty();
        let seq = self.next_seq();
        self.broadcast(ServerMessage::Batch {
            seq,
            records,
            appended: false,
            commentary: decision.message,
            state: self.state.snapshot(),
        });

        if let Some(victory) = victory {
            self.finish(victory);
            return;
        }

        self.resume = Resume::Advance;
        if empty {
            self.phase = TurnPhase::Idle;
            self.schedule_settle();
        } else {
            self.phase = TurnPhase::AwaitingAnimationAck { batches: 1 };
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.batch_seq += 1;
        self.batch_seq
    }

    fn schedule_settle(&mut self) {
        self.settle_tokens += 1;
        let token = self.settle_tokens;
        self.pending_settle = Some(token);
        let delay = self.config.settle_delay();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::Settled { token });
        });
    }

    fn on_settled(&mut self, token: u64) {
        if self.pending_settle != Some(token) {
            return;
        }
        self.pending_settle = None;
        self.resume_loop();
    }

    fn on_animation_complete(&mut self, seq: u64) {
        match self.phase {
            TurnPhase::AwaitingAnimationAck { batches } if seq == self.batch_seq => {
                tracing::debug!(batches, seq, "animations acknowledged");
                self.phase = TurnPhase::Idle;
                self.resume_loop();
            }
            TurnPhase::AwaitingAnimationAck { .. } => {
                tracing::debug!(seq, newest = self.batch_seq, "ignoring acknowledgement of an older batch");
            }
            _ => tracing::debug!(phase = ?self.phase, seq, "ignoring unexpected acknowledgement"),
        }
    }

    /// Nothing is suspended any more: replay an interrupted turn, start a
    /// held one, or advance
    fn resume_loop(&mut self) {
        if self.interrupt.take_restart() {
            self.begin_turn(true);
            return;
        }
        match self.resume {
            Resume::Start => self.begin_turn(false),
            Resume::Advance => self.finish_turn(),
        }
    }

    fn finish_turn(&mut self) {
        let wrapped = self.state.advance();
        if wrapped {
            tracing::info!(round = self.state.round, "new round");
        }
        if let Some(victory) = self.state.check_victory(self.config.max_rounds) {
            self.finish(victory);
            return;
        }
        self.begin_turn(false);
    }

    fn finish(&mut self, victory: Victory) {
        tracing::info!(winner = %victory.winner, kind = ?victory.kind, "game over");
        self.state.finish(victory.clone());
        self.phase = TurnPhase::Idle;
        self.pending_settle = None;
        self.broadcast(ServerMessage::GameOver { victory });
    }

    // === OBSERVER ===

    /// Apply an observer act immediately, whatever the phase.
    ///
    /// An in-flight decision is cancelled and its participant will replay the
    /// turn. While a batch is still animating, the act's batch is appended to
    /// it instead of starting a competing stream.
    fn on_privileged(&mut self, action: PrivilegedAction) -> ChangeRecord {
        if let Err(reason) = Resolver::validate_privileged(&self.state, &action) {
            tracing::warn!(%reason, "privileged act rejected");
            let record = self.resolver.apply_privileged(&mut self.state, action);
            self.stats.record_privileged(&record);
            return record;
        }
        let affected = affected_participants(&self.state, &action);

        match self.phase.clone() {
            TurnPhase::AwaitingDecision {
                participant,
                generation,
            } => {
                self.interrupt.cancel(generation);
                self.interrupt.request_restart();
                self.stats.cancelled(&participant);
                tracing::info!(faction = %participant, generation, "decision interrupted");
                self.phase = TurnPhase::Aborted { participant };
            }
            TurnPhase::Idle => {
                if self.pending_settle.take().is_some() {
                    tracing::debug!("settle delay superseded by privileged act");
                }
            }
            _ => {}
        }

        let record = self.resolver.apply_privileged(&mut self.state, action.clone());
        self.stats.record_privileged(&record);
        tracing::info!(act = %action, "privileged act applied");

        let appended = matches!(self.phase, TurnPhase::AwaitingAnimationAck { .. });
        self.phase = match self.phase {
            TurnPhase::AwaitingAnimationAck { batches } => TurnPhase::AwaitingAnimationAck {
                batches: batches + 1,
            },
            _ => TurnPhase::AwaitingAnimationAck { batches: 1 },
        };
        let seq = self.next_seq();
        self.broadcast(ServerMessage::Batch {
            seq,
            records: vec![record.clone()],
            appended,
            commentary: None,
            state: self.state.snapshot(),
        });

        self.spawn_enrichment(PrivilegedEvent::new(self.state.round, action), affected);
        record
    }

    fn spawn_enrichment(&mut self, event: PrivilegedEvent, affected: Vec<FactionId>) {
        if affected.is_empty() {
            return;
        }
        self.gate.register(event.id, affected.clone());

        let current: FlavorBook = affected
            .iter()
            .map(|id| (id.clone(), self.flavor.get(id).cloned().unwrap_or_default()))
            .collect();
        let service = Arc::clone(&self.enrichment);
        let timeout = self.config.enrichment_timeout();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(
                timeout,
                service.enrich(current, &event, &affected),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GameError::Llm("enrichment timed out".into())),
            };
            let _ = tx.send(Internal::Enriched {
                event: event.id,
                result,
            });
        });
    }

    fn on_enriched(&mut self, event: EventId, result: Result<FlavorBook, GameError>) {
        let affected = self.gate.complete(event);
        match result {
            Ok(mut book) => {
                for id in &affected {
                    if let Some(flavor) = book.remove(id) {
                        self.flavor.insert(id.clone(), flavor);
                    }
                }
            }
            // Prior flavor stays in place
            Err(e) => tracing::warn!(error = %e, "enrichment failed"),
        }

        if self.gated && self.phase == TurnPhase::Idle {
            self.resume_loop();
        }
    }

    /// Full state for one client. Changes nothing; a client that lost its
    /// animation queue acknowledges `awaiting_ack` itself once it has drawn
    /// the snapshot.
    fn snapshot(&self) -> ServerMessage {
        let awaiting_ack = match self.phase {
            TurnPhase::AwaitingAnimationAck { .. } => Some(self.batch_seq),
            _ => None,
        };
        ServerMessage::Snapshot {
            state: self.state.snapshot(),
            awaiting_ack,
        }
    }
}
