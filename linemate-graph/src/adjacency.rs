//! Teammate adjacency index: player → sorted list of everyone they have
//! shared a roster with.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::watch;

use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{GameRecord, PlayerId, Roster};

// ─── Index ─────────────────────────────────────────────────────────────────

/// Immutable adjacency map built once from the full set of game records.
///
/// Each roster is expanded into a clique: every pair of distinct players who
/// dressed for the same team in the same game becomes mutually adjacent.
/// Opposing rosters never produce edges. Players who never shared a roster
/// with anyone do not appear at all.
///
/// Neighbor lists are sorted ascending and deduplicated, so lookups and
/// traversal order are reproducible run to run.
#[derive(Debug)]
pub struct TeammateIndex {
    adjacency: BTreeMap<PlayerId, Vec<PlayerId>>,
    edge_count: usize,
}

impl TeammateIndex {
    /// Build from every roster of every game.
    pub fn build<'a, I>(games: I) -> Self
    where
        I: IntoIterator<Item = &'a GameRecord>,
    {
        Self::build_where(games, |_, _| true)
    }

    /// Build from only the rosters the predicate keeps. The predicate sees
    /// the game and one of its rosters; rejecting a roster drops that whole
    /// clique without affecting the opposing side.
    pub fn build_where<'a, I, F>(games: I, mut keep: F) -> Self
    where
        I: IntoIterator<Item = &'a GameRecord>,
        F: FnMut(&GameRecord, &Roster) -> bool,
    {
        let mut sets: BTreeMap<PlayerId, BTreeSet<PlayerId>> = BTreeMap::new();
        for game in games {
            for roster in [&game.home, &game.away] {
                if roster.players.len() < 2 || !keep(game, roster) {
                    continue;
                }
                link_group(&mut sets, &roster.players);
            }
        }

        let mut adjacency = BTreeMap::new();
        let mut half_edges = 0usize;
        for (player, teammates) in sets {
            half_edges += teammates.len();
            adjacency.insert(player, teammates.into_iter().collect::<Vec<_>>());
        }

        TeammateIndex {
            adjacency,
            edge_count: half_edges / 2,
        }
    }

    /// All teammates of a player, ascending. Empty for unknown players.
    pub fn neighbors(&self, player: PlayerId) -> &[PlayerId] {
        self.adjacency
            .get(&player)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn are_teammates(&self, a: PlayerId, b: PlayerId) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.adjacency.contains_key(&player)
    }

    pub fn degree(&self, player: PlayerId) -> usize {
        self.neighbors(player).len()
    }

    /// Players with at least one teammate, ascending.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn player_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of distinct unordered teammate pairs.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

fn link_group(sets: &mut BTreeMap<PlayerId, BTreeSet<PlayerId>>, players: &[PlayerId]) {
    for (i, &a) in players.iter().enumerate() {
        for &b in &players[i + 1..] {
            if a == b {
                continue;
            }
            sets.entry(a).or_default().insert(b);
            sets.entry(b).or_default().insert(a);
        }
    }
}

// ─── Lifecycle ─────────────────────────────────────────────────────────────

/// Whether the process-wide index is still being built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
    Building,
    Ready,
}

/// Create the publisher/handle pair for the process-wide index.
///
/// The handle starts in [`IndexState::Building`] and flips to `Ready` exactly
/// once, when the publisher delivers the finished index. Readers never
/// observe a partially populated map.
pub fn index_channel() -> (IndexPublisher, IndexHandle) {
    let (tx, rx) = watch::channel(None);
    (IndexPublisher { tx }, IndexHandle { rx })
}

/// Write half. Consumed on publish so the index cannot be swapped later.
pub struct IndexPublisher {
    tx: watch::Sender<Option<Arc<TeammateIndex>>>,
}

impl IndexPublisher {
    pub fn publish(self, index: TeammateIndex) -> Arc<TeammateIndex> {
        let shared = Arc::new(index);
        let _ = self.tx.send(Some(Arc::clone(&shared)));
        shared
    }
}

/// Read half. Cheap to clone; one per subsystem that queries adjacency.
#[derive(Clone)]
pub struct IndexHandle {
    rx: watch::Receiver<Option<Arc<TeammateIndex>>>,
}

impl IndexHandle {
    pub fn state(&self) -> IndexState {
        if self.rx.borrow().is_some() {
            IndexState::Ready
        } else {
            IndexState::Building
        }
    }

    /// The index, if it has already been published.
    pub fn try_get(&self) -> Option<Arc<TeammateIndex>> {
        self.rx.borrow().clone()
    }

    /// Wait until the index is published. Reads issued while the build is
    /// still running park here rather than seeing partial state.
    pub async fn ready(&self) -> LinemateResult<Arc<TeammateIndex>> {
        let mut rx = self.rx.clone();
        loop {
            if let Some(index) = rx.borrow_and_update().clone() {
                return Ok(index);
            }
            if rx.changed().await.is_err() {
                return Err(LinemateError::Internal(
                    "adjacency index publisher dropped before the build finished".into(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linemate_core::types::{season_of_game, GameCategory, TeamToken};
    use std::time::Duration;

    fn make_game(game_id: u64, home: &[PlayerId], away: &[PlayerId]) -> GameRecord {
        let season = season_of_game(game_id);
        GameRecord {
            game_id,
            season,
            category: GameCategory::from_game_id(game_id).unwrap(),
            home: Roster {
                team: TeamToken::new("EDM", season),
                players: home.to_vec(),
            },
            away: Roster {
                team: TeamToken::new("VAN", season),
                players: away.to_vec(),
            },
        }
    }

    #[test]
    fn test_clique_expansion_within_roster() {
        let games = vec![make_game(2023020001, &[1, 2, 3], &[4, 5])];
        let index = TeammateIndex::build(&games);

        assert_eq!(index.neighbors(1), &[2, 3]);
        assert_eq!(index.neighbors(2), &[1, 3]);
        assert_eq!(index.neighbors(4), &[5]);
        assert_eq!(index.edge_count(), 4);
        assert_eq!(index.player_count(), 5);
    }

    #[test]
    fn test_no_edges_across_rosters() {
        let games = vec![make_game(2023020001, &[1, 2], &[3, 4])];
        let index = TeammateIndex::build(&games);

        assert!(index.are_teammates(1, 2));
        assert!(index.are_teammates(3, 4));
        assert!(!index.are_teammates(1, 3));
        assert!(!index.are_teammates(2, 4));
    }

    #[test]
    fn test_neighbors_sorted_and_deduped() {
        let games = vec![
            make_game(2023020001, &[2, 1], &[]),
            make_game(2023020002, &[3, 1, 2], &[]),
        ];
        let index = TeammateIndex::build(&games);

        // The (1,2) pair appears in both games but is stored once.
        assert_eq!(index.neighbors(1), &[2, 3]);
        assert_eq!(index.neighbors(2), &[1, 3]);
        assert_eq!(index.edge_count(), 3);
    }

    #[test]
    fn test_unknown_player_is_empty() {
        let games = vec![make_game(2023020001, &[1, 2], &[])];
        let index = TeammateIndex::build(&games);

        assert!(index.neighbors(99).is_empty());
        assert!(!index.contains(99));
        assert_eq!(index.degree(99), 0);
        assert!(!index.are_teammates(1, 99));
    }

    #[test]
    fn test_solo_rosters_produce_nothing() {
        let games = vec![make_game(2023020001, &[7], &[8])];
        let index = TeammateIndex::build(&games);

        assert!(index.is_empty());
        assert_eq!(index.player_count(), 0);
        assert_eq!(index.edge_count(), 0);
    }

    #[test]
    fn test_players_iterate_ascending() {
        let games = vec![make_game(2023020001, &[30, 10], &[20, 40])];
        let index = TeammateIndex::build(&games);

        let players: Vec<PlayerId> = index.players().collect();
        assert_eq!(players, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_build_where_category_filter() {
        let games = vec![
            make_game(2023020001, &[1, 2], &[]),
            make_game(2023030001, &[1, 5], &[]),
        ];
        let index = TeammateIndex::build_where(&games, |game, _| {
            game.category == GameCategory::RegularSeason
        });

        assert!(index.are_teammates(1, 2));
        assert!(!index.are_teammates(1, 5));
    }

    #[test]
    fn test_build_where_team_filter() {
        let games = vec![make_game(2023020001, &[1, 2], &[3, 4])];
        let index = TeammateIndex::build_where(&games, |_, roster| {
            roster.team.tricode() == "EDM"
        });

        assert!(index.are_teammates(1, 2));
        assert!(!index.are_teammates(3, 4));
        assert!(!index.contains(3));
    }

    #[tokio::test]
    async fn test_handle_building_until_publish() {
        let (publisher, handle) = index_channel();
        assert_eq!(handle.state(), IndexState::Building);
        assert!(handle.try_get().is_none());

        let games = vec![make_game(2023020001, &[1, 2], &[])];
        publisher.publish(TeammateIndex::build(&games));

        assert_eq!(handle.state(), IndexState::Ready);
        let index = handle.try_get().unwrap();
        assert_eq!(index.player_count(), 2);
    }

    #[tokio::test]
    async fn test_ready_wakes_parked_readers() {
        let (publisher, handle) = index_channel();

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.ready().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let games = vec![make_game(2023020001, &[1, 2, 3], &[])];
        publisher.publish(TeammateIndex::build(&games));

        let index = waiter.await.unwrap().unwrap();
        assert_eq!(index.player_count(), 3);
    }

    #[tokio::test]
    async fn test_ready_after_publish_returns_immediately() {
        let (publisher, handle) = index_channel();
        let games = vec![make_game(2023020001, &[1, 2], &[])];
        publisher.publish(TeammateIndex::build(&games));

        let index = handle.ready().await.unwrap();
        assert!(index.are_teammates(1, 2));
    }

    #[tokio::test]
    async fn test_dropped_publisher_errors_waiters() {
        let (publisher, handle) = index_channel();
        drop(publisher);

        let err = handle.ready().await.unwrap_err();
        assert!(matches!(err, LinemateError::Internal(_)));
    }
}
