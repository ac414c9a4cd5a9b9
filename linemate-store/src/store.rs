//! The graph store: player and game facts behind a write-transaction API.
//!
//! All mutation flows through [`GraphStore::commit_game`], one atomic unit of
//! work per game. Before touching shared state, a commit claims per-player
//! locks for every id on either roster, in ascending id order. Two concurrent
//! commits sharing players therefore serialize on those players without any
//! possibility of circular waiting.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{RwLock, RwLockReadGuard};

use linemate_core::config::StoreConfig;
use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{GameId, GameRecord, PlayerId, PlayerName, TeamToken, Timestamp};

use crate::locks::{LockLease, PlayerLockTable};
use crate::snapshot::{PlayerSnapshot, StoreSnapshot};

// ─── Records ───────────────────────────────────────────────────────────────

/// Per-player state held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: Option<PlayerName>,
    /// Bumped on every merge that includes this player, even when nothing
    /// else about the record changes.
    pub touched_at: Timestamp,
}

// ─── StoreInner ────────────────────────────────────────────────────────────

/// The raw fact tables. Readers borrow this through [`GraphStore::read`].
pub struct StoreInner {
    players: HashMap<PlayerId, PlayerRecord>,
    games: HashMap<GameId, GameRecord>,
    /// Derived index: every (game, team) appearance per player. Rebuilt from
    /// `games` on snapshot load.
    by_player: HashMap<PlayerId, Vec<(GameId, TeamToken)>>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            players: HashMap::new(),
            games: HashMap::new(),
            by_player: HashMap::new(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn has_player(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// All player ids, ascending.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn players(&self) -> impl Iterator<Item = (PlayerId, &PlayerRecord)> {
        self.players.iter().map(|(id, rec)| (*id, rec))
    }

    pub fn game(&self, id: GameId) -> Option<&GameRecord> {
        self.games.get(&id)
    }

    pub fn has_game(&self, id: GameId) -> bool {
        self.games.contains_key(&id)
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// All game ids, ascending.
    pub fn game_ids(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.games.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn games(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.values()
    }

    pub fn max_game_id(&self) -> Option<GameId> {
        self.games.keys().copied().max()
    }

    /// Every (game, team) appearance recorded for a player.
    pub fn appearances(&self, id: PlayerId) -> &[(GameId, TeamToken)] {
        self.by_player
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Merge one game: upsert every participating player in ascending id
    /// order with a forced touch, backfill missing names, then insert the
    /// game facts.
    fn apply_game(
        &mut self,
        record: GameRecord,
        names: &HashMap<PlayerId, PlayerName>,
        now: Timestamp,
    ) {
        for id in record.player_ids_sorted() {
            let rec = self.players.entry(id).or_insert(PlayerRecord {
                name: None,
                touched_at: now,
            });
            rec.touched_at = now;
            if rec.name.is_none() {
                if let Some(name) = names.get(&id) {
                    rec.name = Some(name.clone());
                }
            }
        }
        self.insert_game(record);
    }

    /// Insert-or-replace a game and keep the appearance index in step.
    fn insert_game(&mut self, record: GameRecord) {
        if let Some(old) = self.games.remove(&record.game_id) {
            for id in old.player_ids_sorted() {
                if let Some(list) = self.by_player.get_mut(&id) {
                    list.retain(|(g, _)| *g != record.game_id);
                }
            }
        }
        for roster in [&record.home, &record.away] {
            for &id in &roster.players {
                self.by_player
                    .entry(id)
                    .or_default()
                    .push((record.game_id, roster.team.clone()));
            }
        }
        self.games.insert(record.game_id, record);
    }
}

// ─── GraphStore ────────────────────────────────────────────────────────────

/// Thread-safe store handle shared across the ingestion pipeline, the query
/// engine, and the session coordinator.
pub struct GraphStore {
    inner: RwLock<StoreInner>,
    locks: PlayerLockTable,
    txn_max_retries: u32,
    txn_backoff_base: Duration,
}

impl GraphStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: RwLock::new(StoreInner::new()),
            locks: PlayerLockTable::new(),
            txn_max_retries: config.txn_max_retries,
            txn_backoff_base: Duration::from_millis(config.txn_backoff_base_ms),
        }
    }

    /// Borrow the fact tables for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    /// Atomically merge one game into the store.
    ///
    /// Claims per-player locks for the game's full roster set (ascending id
    /// order) before writing, retrying with multiplicative backoff while a
    /// concurrent commit holds an overlapping set. Re-committing a game the
    /// store already contains replaces its facts, so a pipeline can safely
    /// retry games that previously failed partway.
    pub async fn commit_game(
        &self,
        record: GameRecord,
        names: &HashMap<PlayerId, PlayerName>,
    ) -> LinemateResult<()> {
        let ids = record.player_ids_sorted();

        let mut attempt = 0u32;
        while !self.locks.try_acquire(&ids) {
            attempt += 1;
            if attempt >= self.txn_max_retries {
                return Err(LinemateError::TxnFailed {
                    attempts: attempt,
                    reason: format!("players of game {} held by concurrent writers", record.game_id),
                });
            }
            let delay = self.txn_backoff_base * (1u32 << (attempt - 1).min(10));
            tokio::time::sleep(delay).await;
        }
        let _lease = LockLease::new(&self.locks, &ids);

        let now = now_millis();
        let mut inner = self.inner.write();
        inner.apply_game(record, names, now);
        Ok(())
    }

    /// Capture the full store contents for persistence. Rows are emitted in
    /// ascending id order so identical states produce identical snapshots.
    pub fn to_snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        let mut players: Vec<PlayerSnapshot> = inner
            .players
            .iter()
            .map(|(id, rec)| PlayerSnapshot {
                player_id: *id,
                name: rec.name.clone(),
                touched_at: rec.touched_at,
            })
            .collect();
        players.sort_unstable_by_key(|p| p.player_id);

        let mut games: Vec<GameRecord> = inner.games.values().cloned().collect();
        games.sort_unstable_by_key(|g| g.game_id);

        StoreSnapshot {
            created_at: now_millis(),
            players,
            games,
        }
    }

    /// Replace the store contents with a loaded snapshot, rebuilding the
    /// appearance index.
    pub fn load_snapshot_data(&self, snapshot: StoreSnapshot) {
        let mut inner = self.inner.write();
        *inner = StoreInner::new();
        for ps in snapshot.players {
            inner.players.insert(
                ps.player_id,
                PlayerRecord {
                    name: ps.name,
                    touched_at: ps.touched_at,
                },
            );
        }
        for game in snapshot.games {
            inner.insert_game(game);
        }
    }

    /// Drop every player, game, and appearance.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = StoreInner::new();
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ─── Tests ─────────────────────────────────────────────────────────────────
