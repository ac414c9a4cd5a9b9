//! Query engine translating filtered read requests into store scans and
//! index traversals.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use rand::Rng;

use linemate_core::config::GameConfig;
use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{GameId, PlayerId, TeamToken};
use linemate_graph::adjacency::{IndexHandle, TeammateIndex};
use linemate_graph::traversal;
use linemate_store::store::{GraphStore, StoreInner};

use crate::filter::EdgeFilter;

/// Rows returned by the name search, at most.
const NAME_SEARCH_LIMIT: usize = 25;

/// Attempts at rolling a connected partner before giving up.
const PAIR_ROLL_LIMIT: usize = 50;

// ─── Result types ──────────────────────────────────────────────────────────

/// A player row as returned by read queries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    pub name: Option<String>,
}

/// Aggregate counts served by the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub players: usize,
    pub named_players: usize,
    pub games: usize,
    pub teammate_pairs: usize,
}

// ─── Engine ────────────────────────────────────────────────────────────────

/// Read-only facade over the store and the shared adjacency index.
///
/// Player existence is always checked before filters are evaluated, so an
/// unknown id surfaces as [`LinemateError::PlayerNotFound`] rather than an
/// empty result. Empty results under valid filters are not errors, with one
/// exception: a path query that finds no chain reports
/// [`LinemateError::PathNotFound`].
pub struct QueryEngine {
    store: Arc<GraphStore>,
    index: IndexHandle,
    max_path_depth: usize,
}

impl QueryEngine {
    pub fn new(store: Arc<GraphStore>, index: IndexHandle, config: &GameConfig) -> Self {
        QueryEngine {
            store,
            index,
            max_path_depth: config.max_path_depth,
        }
    }

    // ── Player lookups ──────────────────────────────────────────────────

    pub fn player_by_id(&self, id: PlayerId) -> LinemateResult<PlayerInfo> {
        let inner = self.store.read();
        let record = inner.player(id).ok_or(LinemateError::PlayerNotFound(id))?;
        Ok(PlayerInfo {
            player_id: id,
            name: record.name.as_ref().map(|n| n.full()),
        })
    }

    /// Every player with a resolved name, ordered by full name.
    pub fn all_players(&self) -> Vec<PlayerInfo> {
        let inner = self.store.read();
        let mut rows: Vec<PlayerInfo> = inner
            .players()
            .filter(|(_, record)| record.name.is_some())
            .map(|(id, record)| PlayerInfo {
                player_id: id,
                name: record.name.as_ref().map(|n| n.full()),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.player_id.cmp(&b.player_id)));
        rows
    }

    /// Case-insensitive substring search over full names.
    pub fn players_by_name(&self, query: &str) -> Vec<PlayerInfo> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let inner = self.store.read();
        let mut rows: Vec<PlayerInfo> = inner
            .players()
            .filter_map(|(id, record)| {
                let name = record.name.as_ref()?;
                let full = name.full();
                if full.to_lowercase().contains(&needle) {
                    Some(PlayerInfo {
                        player_id: id,
                        name: Some(full),
                    })
                } else {
                    None
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.player_id.cmp(&b.player_id)));
        rows.truncate(NAME_SEARCH_LIMIT);
        rows
    }

    // ── Adjacency queries ───────────────────────────────────────────────

    /// Whether two players shared a roster in at least one game, per the
    /// shared index.
    pub async fn are_teammates(&self, a: PlayerId, b: PlayerId) -> LinemateResult<bool> {
        let index = self.index.ready().await?;
        Ok(index.are_teammates(a, b))
    }

    /// Everyone who shared a roster with the player in at least one game
    /// passing the filter, ascending by id.
    pub fn teammates_of(
        &self,
        id: PlayerId,
        filter: &EdgeFilter,
    ) -> LinemateResult<Vec<PlayerInfo>> {
        let inner = self.store.read();
        if !inner.has_player(id) {
            return Err(LinemateError::PlayerNotFound(id));
        }

        let mut found: HashSet<PlayerId> = HashSet::new();
        for (game_id, team) in inner.appearances(id) {
            let game = match inner.game(*game_id) {
                Some(g) => g,
                None => continue,
            };
            if !filter.matches(game, team) {
                continue;
            }
            if let Some(roster) = game.roster_of(team) {
                found.extend(roster.players.iter().filter(|&&p| p != id));
            }
        }

        let mut ids: Vec<PlayerId> = found.into_iter().collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(|pid| info_for(&inner, pid)).collect())
    }

    /// Distinct teams the player appeared for in games passing the filter,
    /// ascending.
    pub fn teams_of_player(
        &self,
        id: PlayerId,
        filter: &EdgeFilter,
    ) -> LinemateResult<Vec<TeamToken>> {
        let inner = self.store.read();
        if !inner.has_player(id) {
            return Err(LinemateError::PlayerNotFound(id));
        }

        let mut teams: BTreeSet<TeamToken> = BTreeSet::new();
        for (game_id, team) in inner.appearances(id) {
            if let Some(game) = inner.game(*game_id) {
                if filter.matches(game, team) {
                    teams.insert(team.clone());
                }
            }
        }
        Ok(teams.into_iter().collect())
    }

    /// Teams on which the two players were rostered together in at least
    /// one game passing the filter, ascending. A player shares no team with
    /// themselves.
    pub fn common_teams(
        &self,
        a: PlayerId,
        b: PlayerId,
        filter: &EdgeFilter,
    ) -> LinemateResult<Vec<TeamToken>> {
        let inner = self.store.read();
        if !inner.has_player(a) {
            return Err(LinemateError::PlayerNotFound(a));
        }
        if !inner.has_player(b) {
            return Err(LinemateError::PlayerNotFound(b));
        }
        if a == b {
            return Ok(Vec::new());
        }

        let mut teams: BTreeSet<TeamToken> = BTreeSet::new();
        for (game_id, team) in inner.appearances(a) {
            let game = match inner.game(*game_id) {
                Some(g) => g,
                None => continue,
            };
            if !filter.matches(game, team) {
                continue;
            }
            let shared = game
                .roster_of(team)
                .map_or(false, |roster| roster.players.contains(&b));
            if shared {
                teams.insert(team.clone());
            }
        }
        Ok(teams.into_iter().collect())
    }

    // ── Path queries ────────────────────────────────────────────────────

    /// Minimum-edge-count chain between two players.
    ///
    /// Unfiltered requests run over the shared index; filtered requests
    /// build a one-off index restricted to matching rosters. Include and
    /// exclude constraints are checked against the first path found, not
    /// folded into the search, so a failed include check reports no-path
    /// even when a longer satisfying chain exists.
    pub async fn shortest_path(
        &self,
        source: PlayerId,
        target: PlayerId,
        filter: &EdgeFilter,
        include: &[PlayerId],
        exclude: &[PlayerId],
    ) -> LinemateResult<Vec<PlayerInfo>> {
        {
            let inner = self.store.read();
            if !inner.has_player(source) {
                return Err(LinemateError::PlayerNotFound(source));
            }
            if !inner.has_player(target) {
                return Err(LinemateError::PlayerNotFound(target));
            }
        }

        let shared;
        let ephemeral;
        let index: &TeammateIndex = if filter.is_unfiltered() {
            shared = self.index.ready().await?;
            &shared
        } else {
            let inner = self.store.read();
            ephemeral = TeammateIndex::build_where(inner.games(), |game, roster| {
                filter.matches(game, &roster.team)
            });
            &ephemeral
        };

        let path = traversal::shortest_path(index, source, target, self.max_path_depth)
            .ok_or(LinemateError::PathNotFound(source, target))?;

        if exclude.iter().any(|p| path.contains(p)) {
            return Err(LinemateError::PathNotFound(source, target));
        }
        if include.iter().any(|p| !path.contains(p)) {
            return Err(LinemateError::PathNotFound(source, target));
        }

        let inner = self.store.read();
        Ok(path.into_iter().map(|pid| info_for(&inner, pid)).collect())
    }

    // ── Random picks ────────────────────────────────────────────────────

    /// Uniformly random named player with at least one teammate edge
    /// passing the filter.
    pub fn random_player(&self, filter: &EdgeFilter) -> LinemateResult<PlayerInfo> {
        let inner = self.store.read();
        let candidates = eligible_players(&inner, filter);
        if candidates.is_empty() {
            return Err(LinemateError::NoPlayersMatch);
        }
        let pick = candidates[rand::thread_rng().gen_range(0..candidates.len())];
        Ok(info_for(&inner, pick))
    }

    /// Two random players under the same filter, suitable as the endpoints
    /// of a guessing game. The second pick is re-rolled until it differs
    /// from the first and a teammate chain connects the two; after
    /// [`PAIR_ROLL_LIMIT`] failed rolls the store is treated as having no
    /// matching pair.
    pub async fn random_player_pair(
        &self,
        filter: &EdgeFilter,
    ) -> LinemateResult<(PlayerInfo, PlayerInfo)> {
        let index = self.index.ready().await?;

        let inner = self.store.read();
        let candidates = eligible_players(&inner, filter);
        if candidates.len() < 2 {
            return Err(LinemateError::NoPlayersMatch);
        }

        let mut rng = rand::thread_rng();
        let first = candidates[rng.gen_range(0..candidates.len())];
        for _ in 0..PAIR_ROLL_LIMIT {
            let second = candidates[rng.gen_range(0..candidates.len())];
            if second == first {
                continue;
            }
            if traversal::shortest_path(&index, first, second, self.max_path_depth).is_some() {
                return Ok((info_for(&inner, first), info_for(&inner, second)));
            }
        }
        Err(LinemateError::NoPlayersMatch)
    }

    // ── Store listings ──────────────────────────────────────────────────

    /// Distinct franchise tricodes across all stored games, ascending.
    pub fn all_teams(&self) -> Vec<String> {
        let inner = self.store.read();
        let mut teams: BTreeSet<String> = BTreeSet::new();
        for game in inner.games() {
            teams.insert(game.home.team.tricode().to_string());
            teams.insert(game.away.team.tricode().to_string());
        }
        teams.into_iter().collect()
    }

    /// Every stored game id, ascending.
    pub fn all_games(&self) -> Vec<GameId> {
        self.store.read().game_ids()
    }

    /// Starting year of the most recent season with a stored game.
    pub fn latest_season_start_year(&self) -> Option<u32> {
        self.store
            .read()
            .max_game_id()
            .map(|id| (id / 1_000_000) as u32)
    }

    // ── Aggregates ──────────────────────────────────────────────────────

    pub async fn stats(&self) -> LinemateResult<StoreStats> {
        let index = self.index.ready().await?;
        let inner = self.store.read();
        Ok(StoreStats {
            players: inner.player_count(),
            named_players: inner.players().filter(|(_, r)| r.name.is_some()).count(),
            games: inner.game_count(),
            teammate_pairs: index.edge_count(),
        })
    }
}

fn info_for(inner: &StoreInner, id: PlayerId) -> PlayerInfo {
    PlayerInfo {
        player_id: id,
        name: inner
            .player(id)
            .and_then(|r| r.name.as_ref())
            .map(|n| n.full()),
    }
}

/// Named players with at least one teammate edge passing the filter,
/// ascending. A matching appearance on a roster of one carries no edge and
/// does not qualify.
fn eligible_players(inner: &StoreInner, filter: &EdgeFilter) -> Vec<PlayerId> {
    let mut candidates: Vec<PlayerId> = inner
        .players()
        .filter(|(_, record)| record.name.is_some())
        .filter(|(id, _)| {
            inner.appearances(*id).iter().any(|(game_id, team)| {
                inner.game(*game_id).map_or(false, |game| {
                    filter.matches(game, team)
                        && game
                            .roster_of(team)
                            .map_or(false, |roster| roster.players.len() > 1)
                })
            })
        })
        .map(|(id, _)| id)
        .collect();
    candidates.sort_unstable();
    candidates
}

// ─── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use linemate_core::config::StoreConfig;
    use linemate_core::types::{
        season_for_start_year, season_of_game, GameCategory, GameRecord, PlayerName, Roster,
    };
    use linemate_graph::adjacency::index_channel;

    fn game(
        game_id: u64,
        home_team: &str,
        home: &[PlayerId],
        away_team: &str,
        away: &[PlayerId],
    ) -> GameRecord {
        let season = season_of_game(game_id);
        GameRecord {
            game_id,
            season,
            category: GameCategory::from_game_id(game_id).unwrap(),
            home: Roster {
                team: TeamToken::new(home_team, season),
                players: home.to_vec(),
            },
            away: Roster {
                team: TeamToken::new(away_team, season),
                players: away.to_vec(),
            },
        }
    }

    fn names() -> HashMap<PlayerId, PlayerName> {
        let mut names = HashMap::new();
        names.insert(1, PlayerName::new("Connor", "McDavid"));
        names.insert(2, PlayerName::new("Leon", "Draisaitl"));
        names.insert(3, PlayerName::new("Zach", "Hyman"));
        names.insert(4, PlayerName::new("Elias", "Pettersson"));
        names.insert(5, PlayerName::new("Quinn", "Hughes"));
        names.insert(9, PlayerName::new("Stuart", "Skinner"));
        names
    }

    /// Four games:
    ///   g1 2023 regular  EDM {1,2,3} vs VAN {4,5}
    ///   g2 2016 regular  EDM {1,2}   vs TOR {6}      (6 stays unnamed)
    ///   g3 2023 playoffs EDM {1,9}
    ///   g4 2021 regular  VAN {3,4}                    (bridges 1..3..4)
    async fn make_engine() -> QueryEngine {
        let store = Arc::new(GraphStore::new(&StoreConfig::default()));
        let names = names();
        for g in [
            game(2023020001, "EDM", &[1, 2, 3], "VAN", &[4, 5]),
            game(2016020001, "EDM", &[1, 2], "TOR", &[6]),
            game(2023030001, "EDM", &[1, 9], "LAK", &[]),
            game(2021020001, "VAN", &[3, 4], "CGY", &[]),
        ] {
            store.commit_game(g, &names).await.unwrap();
        }

        let (publisher, handle) = index_channel();
        publisher.publish(TeammateIndex::build(store.read().games()));
        QueryEngine::new(store, handle, &GameConfig::default())
    }

    fn ids(rows: &[PlayerInfo]) -> Vec<PlayerId> {
        rows.iter().map(|r| r.player_id).collect()
    }

    #[tokio::test]
    async fn test_player_by_id() {
        let engine = make_engine().await;

        let info = engine.player_by_id(1).unwrap();
        assert_eq!(info.name.as_deref(), Some("Connor McDavid"));

        let err = engine.player_by_id(999).unwrap_err();
        assert!(matches!(err, LinemateError::PlayerNotFound(999)));
    }

    #[tokio::test]
    async fn test_player_without_name_still_found() {
        let engine = make_engine().await;
        let info = engine.player_by_id(6).unwrap();
        assert_eq!(info.name, None);
    }

    #[tokio::test]
    async fn test_all_players_named_sorted_by_name() {
        let engine = make_engine().await;
        let rows = engine.all_players();
        // Player 6 has no resolved name and is omitted.
        assert_eq!(ids(&rows), vec![1, 4, 2, 5, 9, 3]);
        assert_eq!(rows[0].name.as_deref(), Some("Connor McDavid"));
        assert_eq!(rows[5].name.as_deref(), Some("Zach Hyman"));
    }

    #[tokio::test]
    async fn test_players_by_name_substring() {
        let engine = make_engine().await;

        assert_eq!(ids(&engine.players_by_name("mcdavid")), vec![1]);
        assert_eq!(ids(&engine.players_by_name("MCDAVID")), vec![1]);
        assert_eq!(ids(&engine.players_by_name("hughes")), vec![5]);
        assert!(engine.players_by_name("gretzky").is_empty());
        assert!(engine.players_by_name("   ").is_empty());
    }

    #[tokio::test]
    async fn test_are_teammates() {
        let engine = make_engine().await;
        assert!(engine.are_teammates(1, 2).await.unwrap());
        assert!(engine.are_teammates(2, 1).await.unwrap());
        // Opponents in the same game are not teammates.
        assert!(!engine.are_teammates(1, 4).await.unwrap());
        assert!(!engine.are_teammates(1, 999).await.unwrap());
    }

    #[tokio::test]
    async fn test_teammates_unfiltered() {
        let engine = make_engine().await;
        let rows = engine.teammates_of(1, &EdgeFilter::none()).unwrap();
        // Opponents 4 and 5 never share a roster with 1.
        assert_eq!(ids(&rows), vec![2, 3, 9]);
    }

    #[tokio::test]
    async fn test_teammates_season_filter() {
        let engine = make_engine().await;

        let filter = EdgeFilter {
            season_start: Some(season_for_start_year(2016)),
            season_end: Some(season_for_start_year(2018)),
            ..EdgeFilter::none()
        };
        let rows = engine.teammates_of(1, &filter).unwrap();
        assert_eq!(ids(&rows), vec![2]);
    }

    #[tokio::test]
    async fn test_teammates_category_filter() {
        let engine = make_engine().await;

        let filter = EdgeFilter {
            categories: Some(HashSet::from([GameCategory::Playoffs])),
            ..EdgeFilter::none()
        };
        let rows = engine.teammates_of(1, &filter).unwrap();
        assert_eq!(ids(&rows), vec![9]);
    }

    #[tokio::test]
    async fn test_teammates_team_filter() {
        let engine = make_engine().await;

        let filter = EdgeFilter {
            teams: Some(HashSet::from([TeamToken::new("VAN", 20212022)])),
            ..EdgeFilter::none()
        };
        let rows = engine.teammates_of(3, &filter).unwrap();
        assert_eq!(ids(&rows), vec![4]);
    }

    #[tokio::test]
    async fn test_teammates_unknown_player() {
        let engine = make_engine().await;
        let err = engine.teammates_of(999, &EdgeFilter::none()).unwrap_err();
        assert!(matches!(err, LinemateError::PlayerNotFound(999)));
    }

    #[tokio::test]
    async fn test_teams_of_player() {
        let engine = make_engine().await;

        let teams = engine.teams_of_player(1, &EdgeFilter::none()).unwrap();
        let raw: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
        assert_eq!(raw, vec!["EDM20162017", "EDM20232024"]);

        let teams = engine.teams_of_player(3, &EdgeFilter::none()).unwrap();
        let raw: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
        assert_eq!(raw, vec!["EDM20232024", "VAN20212022"]);
    }

    #[tokio::test]
    async fn test_common_teams() {
        let engine = make_engine().await;

        let teams = engine.common_teams(1, 2, &EdgeFilter::none()).unwrap();
        let raw: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
        assert_eq!(raw, vec!["EDM20162017", "EDM20232024"]);

        // Opponents in the same game share nothing.
        assert!(engine.common_teams(1, 4, &EdgeFilter::none()).unwrap().is_empty());

        let teams = engine.common_teams(3, 4, &EdgeFilter::none()).unwrap();
        let raw: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
        assert_eq!(raw, vec!["VAN20212022"]);
    }

    #[tokio::test]
    async fn test_common_teams_filtered() {
        let engine = make_engine().await;

        let filter = EdgeFilter {
            season_start: Some(season_for_start_year(2023)),
            ..EdgeFilter::none()
        };
        let teams = engine.common_teams(1, 2, &filter).unwrap();
        let raw: Vec<&str> = teams.iter().map(|t| t.as_str()).collect();
        assert_eq!(raw, vec!["EDM20232024"]);
    }

    #[tokio::test]
    async fn test_common_teams_self_is_empty() {
        let engine = make_engine().await;
        assert!(engine.common_teams(1, 1, &EdgeFilter::none()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shortest_path_direct() {
        let engine = make_engine().await;
        let path = engine
            .shortest_path(1, 2, &EdgeFilter::none(), &[], &[])
            .await
            .unwrap();
        assert_eq!(ids(&path), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_shortest_path_multi_hop() {
        let engine = make_engine().await;
        // 1 and 4 connect only through 3 (VAN 2021).
        let path = engine
            .shortest_path(1, 4, &EdgeFilter::none(), &[], &[])
            .await
            .unwrap();
        assert_eq!(ids(&path), vec![1, 3, 4]);
        assert_eq!(path[1].name.as_deref(), Some("Zach Hyman"));
    }

    #[tokio::test]
    async fn test_shortest_path_filter_removes_bridge() {
        let engine = make_engine().await;
        let filter = EdgeFilter {
            season_start: Some(season_for_start_year(2023)),
            ..EdgeFilter::none()
        };
        let err = engine
            .shortest_path(1, 4, &filter, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LinemateError::PathNotFound(1, 4)));
    }

    #[tokio::test]
    async fn test_shortest_path_exclude_is_post_hoc() {
        let engine = make_engine().await;
        // The only chain 1..4 runs through 3; excluding 3 is a no-path,
        // not a detour.
        let err = engine
            .shortest_path(1, 4, &EdgeFilter::none(), &[], &[3])
            .await
            .unwrap_err();
        assert!(matches!(err, LinemateError::PathNotFound(1, 4)));
    }

    #[tokio::test]
    async fn test_shortest_path_include_checked_on_first_path() {
        let engine = make_engine().await;

        let path = engine
            .shortest_path(1, 4, &EdgeFilter::none(), &[3], &[])
            .await
            .unwrap();
        assert_eq!(ids(&path), vec![1, 3, 4]);

        let err = engine
            .shortest_path(1, 4, &EdgeFilter::none(), &[2], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LinemateError::PathNotFound(1, 4)));
    }

    #[tokio::test]
    async fn test_shortest_path_existence_beats_filters() {
        let engine = make_engine().await;
        let filter = EdgeFilter {
            teams: Some(HashSet::from([TeamToken::new("ZZZ", 20232024)])),
            ..EdgeFilter::none()
        };
        let err = engine.shortest_path(1, 999, &filter, &[], &[]).await.unwrap_err();
        assert!(matches!(err, LinemateError::PlayerNotFound(999)));
    }

    #[tokio::test]
    async fn test_random_player_respects_filter() {
        let engine = make_engine().await;

        let info = engine.random_player(&EdgeFilter::none()).unwrap();
        assert!([1, 2, 3, 4, 5, 9].contains(&info.player_id));
        assert!(info.name.is_some());

        let filter = EdgeFilter {
            teams: Some(HashSet::from([TeamToken::new("VAN", 20212022)])),
            ..EdgeFilter::none()
        };
        for _ in 0..10 {
            let info = engine.random_player(&filter).unwrap();
            assert!([3, 4].contains(&info.player_id));
        }
    }

    #[tokio::test]
    async fn test_random_player_no_match() {
        let engine = make_engine().await;
        // Player 6 is TOR's only appearance and has no name.
        let filter = EdgeFilter {
            teams: Some(HashSet::from([TeamToken::new("TOR", 20162017)])),
            ..EdgeFilter::none()
        };
        let err = engine.random_player(&filter).unwrap_err();
        assert!(matches!(err, LinemateError::NoPlayersMatch));
    }

    #[tokio::test]
    async fn test_random_player_skips_edgeless_rosters() {
        // 7 is named but alone on TOR's roster, so it carries no edges.
        let store = Arc::new(GraphStore::new(&StoreConfig::default()));
        let mut names = names();
        names.insert(7, PlayerName::new("Auston", "Matthews"));
        store
            .commit_game(game(2023020001, "EDM", &[1, 2], "TOR", &[7]), &names)
            .await
            .unwrap();
        let (publisher, handle) = index_channel();
        publisher.publish(TeammateIndex::build(store.read().games()));
        let engine = QueryEngine::new(store, handle, &GameConfig::default());

        for _ in 0..10 {
            let info = engine.random_player(&EdgeFilter::none()).unwrap();
            assert!([1, 2].contains(&info.player_id));
        }

        let filter = EdgeFilter {
            teams: Some(HashSet::from([TeamToken::new("TOR", 20232024)])),
            ..EdgeFilter::none()
        };
        let err = engine.random_player(&filter).unwrap_err();
        assert!(matches!(err, LinemateError::NoPlayersMatch));
    }

    #[tokio::test]
    async fn test_random_player_pair_distinct() {
        let engine = make_engine().await;

        for _ in 0..10 {
            let (a, b) = engine.random_player_pair(&EdgeFilter::none()).await.unwrap();
            assert_ne!(a.player_id, b.player_id);
        }

        let filter = EdgeFilter {
            teams: Some(HashSet::from([TeamToken::new("VAN", 20212022)])),
            ..EdgeFilter::none()
        };
        let (a, b) = engine.random_player_pair(&filter).await.unwrap();
        let mut picked = vec![a.player_id, b.player_id];
        picked.sort_unstable();
        assert_eq!(picked, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_random_player_pair_stays_connected() {
        // One game, so {1,2} on EDM and {4,5} on VAN are two components
        // with no chain between them.
        let store = Arc::new(GraphStore::new(&StoreConfig::default()));
        store
            .commit_game(game(2023020001, "EDM", &[1, 2], "VAN", &[4, 5]), &names())
            .await
            .unwrap();
        let (publisher, handle) = index_channel();
        publisher.publish(TeammateIndex::build(store.read().games()));
        let engine = QueryEngine::new(store, handle, &GameConfig::default());

        for _ in 0..10 {
            let (a, b) = engine.random_player_pair(&EdgeFilter::none()).await.unwrap();
            assert_eq!(
                a.player_id <= 2,
                b.player_id <= 2,
                "pair {} / {} spans disconnected components",
                a.player_id,
                b.player_id
            );
        }
    }

    #[tokio::test]
    async fn test_all_teams_distinct_tricodes() {
        let engine = make_engine().await;
        assert_eq!(engine.all_teams(), vec!["CGY", "EDM", "LAK", "TOR", "VAN"]);
    }

    #[tokio::test]
    async fn test_all_games_sorted() {
        let engine = make_engine().await;
        assert_eq!(
            engine.all_games(),
            vec![2016020001, 2021020001, 2023020001, 2023030001]
        );
    }

    #[tokio::test]
    async fn test_latest_season_start_year() {
        let engine = make_engine().await;
        assert_eq!(engine.latest_season_start_year(), Some(2023));

        let store = Arc::new(GraphStore::new(&StoreConfig::default()));
        let (_publisher, handle) = index_channel();
        let empty = QueryEngine::new(store, handle, &GameConfig::default());
        assert_eq!(empty.latest_season_start_year(), None);
    }

    #[tokio::test]
    async fn test_stats() {
        let engine = make_engine().await;
        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.players, 7);
        assert_eq!(stats.named_players, 6);
        assert_eq!(stats.games, 4);
        // g1: three EDM pairs + one VAN pair, g2 repeats (1,2),
        // g3 adds (1,9), g4 adds (3,4).
        assert_eq!(stats.teammate_pairs, 6);
    }
}
