//! Turn-based guessing sessions.
//!
//! A session is owned by a single worker task and driven through an mpsc
//! mailbox, so per-game state never needs a lock. Guesses are acknowledged
//! on submission and resolved asynchronously; each outcome lands in the
//! session's pending slot for polling and is broadcast to the session's
//! room.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use linemate_core::config::LinemateConfig;
use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{PlayerId, TeamToken};
use linemate_query::engine::{PlayerInfo, QueryEngine};
use linemate_query::filter::EdgeFilter;

use crate::ws::{RoomEvent, RoomHub};

// ─── Requests and results ──────────────────────────────────────────────────

/// How a session picks its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Fixed random target; the game completes when a guess reaches it.
    TwoPlayer,
    /// No target; the chain grows until the players stop.
    Open,
}

/// Everything needed to start (or restart) a session.
pub struct StartRequest {
    pub participants: Vec<String>,
    pub mode: SessionMode,
    /// Restricts which players are eligible as start and target.
    pub filter: EdgeFilter,
}

/// Response to a successful start.
#[derive(Debug, Clone, Serialize)]
pub struct StartInfo {
    pub start_player: PlayerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_player: Option<PlayerInfo>,
    /// Participant who owns the first turn.
    pub turn: String,
}

/// Outcome of one processed guess. Invalid guesses come back as rejections
/// here, never as errors.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub participant: String,
    pub candidate: PlayerId,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Head of the chain after this guess.
    pub current_player: PlayerId,
    /// Participant who owns the next turn.
    pub turn: String,
    pub guess_count: u32,
    pub completed: bool,
}

enum SessionCommand {
    Start {
        request: StartRequest,
        respond_to: oneshot::Sender<LinemateResult<StartInfo>>,
    },
    Guess {
        participant: String,
        candidate: PlayerId,
    },
    CheckResponse {
        respond_to: oneshot::Sender<Option<TurnResult>>,
    },
    PlayAgain {
        again: bool,
        respond_to: oneshot::Sender<LinemateResult<Option<StartInfo>>>,
    },
}

// ─── Registry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

/// Front door for every live session.
///
/// Holds one mailbox sender per session id; the workers behind them are
/// spawned on first start and removed on teardown.
pub struct SessionRegistry {
    engine: Arc<QueryEngine>,
    rooms: Arc<RoomHub>,
    handles: Mutex<HashMap<String, SessionHandle>>,
    team_use_limit: u32,
    mailbox_depth: usize,
}

impl SessionRegistry {
    pub fn new(engine: Arc<QueryEngine>, rooms: Arc<RoomHub>, config: &LinemateConfig) -> Self {
        SessionRegistry {
            engine,
            rooms,
            handles: Mutex::new(HashMap::new()),
            team_use_limit: config.game.team_use_limit,
            mailbox_depth: config.server.session_buffer,
        }
    }

    /// Number of sessions with a live worker.
    pub fn active_sessions(&self) -> usize {
        self.handles.lock().len()
    }

    /// Create or restart the session. Restarting an active session rerolls
    /// its players and resets all game state.
    pub async fn start(
        &self,
        session_id: &str,
        request: StartRequest,
    ) -> LinemateResult<StartInfo> {
        if request.participants.is_empty() {
            return Err(LinemateError::InvalidSession(
                "at least one participant is required".into(),
            ));
        }
        if request.mode == SessionMode::TwoPlayer && request.participants.len() != 2 {
            return Err(LinemateError::InvalidSession(
                "two_player mode takes exactly two participants".into(),
            ));
        }

        let (handle, fresh) = {
            let mut handles = self.handles.lock();
            match handles.get(session_id) {
                Some(handle) => (handle.clone(), false),
                None => {
                    let handle = self.spawn_worker(session_id);
                    handles.insert(session_id.to_string(), handle.clone());
                    (handle, true)
                }
            }
        };

        let (tx, rx) = oneshot::channel();
        let command = SessionCommand::Start {
            request,
            respond_to: tx,
        };
        let started = if handle.tx.send(command).await.is_ok() {
            match rx.await {
                Ok(started) => started,
                Err(_) => Err(LinemateError::SessionNotFound(session_id.to_string())),
            }
        } else {
            Err(LinemateError::SessionNotFound(session_id.to_string()))
        };

        // A brand-new worker that failed to start holds no game worth keeping.
        if started.is_err() && fresh {
            self.handles.lock().remove(session_id);
        }
        started
    }

    /// Enqueue a guess. The ack only means the guess was accepted for
    /// processing; the outcome arrives via `check_response` and the room.
    pub async fn guess(
        &self,
        session_id: &str,
        participant: String,
        candidate: PlayerId,
    ) -> LinemateResult<()> {
        let handle = self.handle_for(session_id)?;
        handle
            .tx
            .send(SessionCommand::Guess {
                participant,
                candidate,
            })
            .await
            .map_err(|_| LinemateError::SessionNotFound(session_id.to_string()))
    }

    /// Take the latest pending result, if one has arrived since the last
    /// poll.
    pub async fn check_response(&self, session_id: &str) -> LinemateResult<Option<TurnResult>> {
        let handle = self.handle_for(session_id)?;
        let (tx, rx) = oneshot::channel();
        handle
            .tx
            .send(SessionCommand::CheckResponse { respond_to: tx })
            .await
            .map_err(|_| LinemateError::SessionNotFound(session_id.to_string()))?;
        rx.await
            .map_err(|_| LinemateError::SessionNotFound(session_id.to_string()))
    }

    /// Restart the session with its previous options, or tear it down.
    /// Returns the new start info when restarting, `None` on teardown.
    pub async fn play_again(
        &self,
        session_id: &str,
        again: bool,
    ) -> LinemateResult<Option<StartInfo>> {
        let handle = self.handle_for(session_id)?;
        let (tx, rx) = oneshot::channel();
        handle
            .tx
            .send(SessionCommand::PlayAgain {
                again,
                respond_to: tx,
            })
            .await
            .map_err(|_| LinemateError::SessionNotFound(session_id.to_string()))?;
        let result = rx
            .await
            .map_err(|_| LinemateError::SessionNotFound(session_id.to_string()))?;
        if !again {
            self.handles.lock().remove(session_id);
        }
        result
    }

    fn handle_for(&self, session_id: &str) -> LinemateResult<SessionHandle> {
        self.handles
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| LinemateError::SessionNotFound(session_id.to_string()))
    }

    fn spawn_worker(&self, session_id: &str) -> SessionHandle {
        let (tx, rx) = mpsc::channel(self.mailbox_depth);
        let worker = SessionWorker {
            session_id: session_id.to_string(),
            engine: Arc::clone(&self.engine),
            rooms: Arc::clone(&self.rooms),
            team_use_limit: self.team_use_limit,
            options: None,
            session: None,
            pending: None,
        };
        tokio::spawn(worker.run(rx));
        SessionHandle { tx }
    }
}

// ─── Worker ────────────────────────────────────────────────────────────────

struct SessionWorker {
    session_id: String,
    engine: Arc<QueryEngine>,
    rooms: Arc<RoomHub>,
    team_use_limit: u32,
    /// Start options, kept for play-again rerolls.
    options: Option<StartRequest>,
    session: Option<GameSession>,
    /// Latest unclaimed turn result.
    pending: Option<TurnResult>,
}

impl SessionWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                SessionCommand::Start {
                    request,
                    respond_to,
                } => {
                    self.options = Some(request);
                    let started = self.start_session().await;
                    let _ = respond_to.send(started);
                }
                SessionCommand::Guess {
                    participant,
                    candidate,
                } => {
                    match self.process_guess(participant, candidate).await {
                        Some(result) => {
                            self.rooms.publish(
                                &self.session_id,
                                RoomEvent::TurnResult {
                                    result: result.clone(),
                                },
                            );
                            self.pending = Some(result);
                        }
                        None => tracing::warn!(
                            session_id = %self.session_id,
                            "dropping guess for a session that never started"
                        ),
                    }
                }
                SessionCommand::CheckResponse { respond_to } => {
                    let _ = respond_to.send(self.pending.take());
                }
                SessionCommand::PlayAgain { again, respond_to } => {
                    if again {
                        let restarted = self.start_session().await;
                        let _ = respond_to.send(restarted.map(Some));
                    } else {
                        let _ = respond_to.send(Ok(None));
                        tracing::debug!(session_id = %self.session_id, "session torn down");
                        break;
                    }
                }
            }
        }
    }

    async fn start_session(&mut self) -> LinemateResult<StartInfo> {
        let options = self.options.as_ref().ok_or_else(|| {
            LinemateError::InvalidSession("session has never been started".into())
        })?;

        let (start, target) = match options.mode {
            SessionMode::TwoPlayer => {
                let (start, target) = self.engine.random_player_pair(&options.filter).await?;
                (start, Some(target))
            }
            SessionMode::Open => (self.engine.random_player(&options.filter)?, None),
        };

        let turn = options.participants[0].clone();
        tracing::info!(
            session_id = %self.session_id,
            start = start.player_id,
            target = target.as_ref().map(|p| p.player_id),
            "session started"
        );
        self.session = Some(GameSession {
            mode: options.mode,
            participants: options.participants.clone(),
            current_player: start.player_id,
            target_player: target.as_ref().map(|p| p.player_id),
            locked: HashSet::from([start.player_id]),
            team_usage: HashMap::new(),
            guess_count: 0,
            turn_idx: 0,
            completed: false,
        });
        self.pending = None;
        Ok(StartInfo {
            start_player: start,
            end_player: target,
            turn,
        })
    }

    /// Run one guess through the acceptance rules. Every return is a
    /// structured result; `None` only when no game exists to guess against.
    async fn process_guess(
        &mut self,
        participant: String,
        candidate: PlayerId,
    ) -> Option<TurnResult> {
        let session = self.session.as_mut()?;

        // A finished game absorbs further guesses without touching any
        // state, the turn included.
        if session.completed {
            return Some(session.result(
                participant,
                candidate,
                false,
                Some("game is already completed".into()),
            ));
        }

        let adjacent = match self
            .engine
            .are_teammates(session.current_player, candidate)
            .await
        {
            Ok(adjacent) => adjacent,
            Err(err) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %err,
                    "adjacency lookup failed"
                );
                session.advance_turn(false);
                return Some(session.result(
                    participant,
                    candidate,
                    false,
                    Some("engine unavailable".into()),
                ));
            }
        };
        if !adjacent {
            session.advance_turn(false);
            return Some(session.result(
                participant,
                candidate,
                false,
                Some("not a teammate of the current player".into()),
            ));
        }

        if session.locked.contains(&candidate) {
            session.advance_turn(false);
            return Some(session.result(
                participant,
                candidate,
                false,
                Some("player already used this game".into()),
            ));
        }

        let teams = match self
            .engine
            .common_teams(session.current_player, candidate, &EdgeFilter::none())
        {
            Ok(teams) => teams,
            Err(err) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %err,
                    "common-teams lookup failed"
                );
                session.advance_turn(false);
                return Some(session.result(
                    participant,
                    candidate,
                    false,
                    Some("engine unavailable".into()),
                ));
            }
        };

        // Counters bump token by token, in order. A cap hit rejects on the
        // spot: bumps already made stay, later tokens never bump.
        for team in teams {
            let used = session.team_usage.entry(team.clone()).or_insert(0);
            *used += 1;
            if *used > self.team_use_limit {
                session.advance_turn(false);
                return Some(session.result(
                    participant,
                    candidate,
                    false,
                    Some(format!(
                        "team {team} already used {} times",
                        self.team_use_limit
                    )),
                ));
            }
        }

        session.current_player = candidate;
        session.locked.insert(candidate);
        session.guess_count += 1;
        if session.target_player == Some(candidate) {
            session.completed = true;
            tracing::info!(
                session_id = %self.session_id,
                winner = %participant,
                guesses = session.guess_count,
                "session completed"
            );
        }
        session.advance_turn(true);
        Some(session.result(participant, candidate, true, None))
    }
}

// ─── Game state ────────────────────────────────────────────────────────────

struct GameSession {
    mode: SessionMode,
    participants: Vec<String>,
    current_player: PlayerId,
    target_player: Option<PlayerId>,
    /// Players already in the chain, the start included.
    locked: HashSet<PlayerId>,
    team_usage: HashMap<TeamToken, u32>,
    guess_count: u32,
    turn_idx: usize,
    completed: bool,
}

impl GameSession {
    fn turn_owner(&self) -> &str {
        &self.participants[self.turn_idx]
    }

    /// Two-player alternates on every processed guess; open rotation moves
    /// only after an accepted one.
    fn advance_turn(&mut self, accepted: bool) {
        let advance = match self.mode {
            SessionMode::TwoPlayer => true,
            SessionMode::Open => accepted,
        };
        if advance {
            self.turn_idx = (self.turn_idx + 1) % self.participants.len();
        }
    }

    fn result(
        &self,
        participant: String,
        candidate: PlayerId,
        accepted: bool,
        reason: Option<String>,
    ) -> TurnResult {
        TurnResult {
            participant,
            candidate,
            accepted,
            reason,
            current_player: self.current_player,
            turn: self.turn_owner().to_string(),
            guess_count: self.guess_count,
            completed: self.completed,
        }
    }
}
