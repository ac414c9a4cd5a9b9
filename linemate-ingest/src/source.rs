//! Upstream game data sources.
//!
//! [`GameSource`] is the boundary the pipeline fetches through;
//! [`NhlApiSource`] is the production implementation against the public
//! NHL stats endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use linemate_core::config::SourceConfig;
use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{
    season_of_game, GameCategory, GameId, GameRecord, PlayerId, PlayerName, Roster, SeasonCode,
    TeamToken,
};

/// Remote source of game rosters and player names.
///
/// Implementations return `Ok(None)` for permanent not-found conditions and
/// reserve errors for transport faults and malformed payloads.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Every game id the source knows for a season.
    async fn list_season_game_ids(&self, season: SeasonCode) -> LinemateResult<Vec<GameId>>;

    /// Full roster facts for one game. `Ok(None)` when the source has no
    /// record of the game or the game was cancelled.
    async fn fetch_game(&self, game_id: GameId) -> LinemateResult<Option<GameRecord>>;

    /// A player's display name, if the source can resolve it.
    async fn fetch_player_name(&self, player_id: PlayerId)
        -> LinemateResult<Option<PlayerName>>;
}

// ─── Wire payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeasonGameList {
    #[serde(default)]
    data: Vec<SeasonGameRow>,
}

#[derive(Debug, Deserialize)]
struct SeasonGameRow {
    id: GameId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Boxscore {
    season: Option<SeasonCode>,
    home_team: Option<TeamSide>,
    away_team: Option<TeamSide>,
    player_by_game_stats: Option<PlayerByGameStats>,
}

#[derive(Debug, Deserialize)]
struct TeamSide {
    abbrev: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerByGameStats {
    home_team: Option<TeamPlayers>,
    away_team: Option<TeamPlayers>,
}

#[derive(Debug, Default, Deserialize)]
struct TeamPlayers {
    #[serde(default)]
    forwards: Vec<PlayerRef>,
    #[serde(default)]
    defense: Vec<PlayerRef>,
    #[serde(default)]
    goalies: Vec<PlayerRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRef {
    player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerLanding {
    first_name: Option<NameField>,
    last_name: Option<NameField>,
}

#[derive(Debug, Deserialize)]
struct NameField {
    default: Option<String>,
}

// ─── Conversion ────────────────────────────────────────────────────────────

fn roster_players(side: Option<TeamPlayers>) -> Vec<PlayerId> {
    let side = side.unwrap_or_default();
    let mut players: Vec<PlayerId> = side
        .forwards
        .into_iter()
        .chain(side.defense)
        .chain(side.goalies)
        .map(|p| p.player_id)
        .collect();
    players.sort_unstable();
    players.dedup();
    players
}

/// Flatten a boxscore payload into a [`GameRecord`].
///
/// Cancelled games yield `Ok(None)`. A payload missing team abbreviations
/// or the player stats block is reported as incomplete.
fn game_record_from_boxscore(
    game_id: GameId,
    boxscore: Boxscore,
) -> LinemateResult<Option<GameRecord>> {
    let category = match GameCategory::from_game_id(game_id) {
        Some(category) => category,
        None => return Ok(None),
    };
    let season = boxscore.season.unwrap_or_else(|| season_of_game(game_id));

    let home_abbrev = boxscore
        .home_team
        .and_then(|t| t.abbrev)
        .ok_or_else(|| LinemateError::IncompleteGame(game_id, "home team abbrev".into()))?;
    let away_abbrev = boxscore
        .away_team
        .and_then(|t| t.abbrev)
        .ok_or_else(|| LinemateError::IncompleteGame(game_id, "away team abbrev".into()))?;

    let stats = boxscore
        .player_by_game_stats
        .ok_or_else(|| LinemateError::IncompleteGame(game_id, "player stats".into()))?;

    Ok(Some(GameRecord {
        game_id,
        season,
        category,
        home: Roster {
            team: TeamToken::new(&home_abbrev, season),
            players: roster_players(stats.home_team),
        },
        away: Roster {
            team: TeamToken::new(&away_abbrev, season),
            players: roster_players(stats.away_team),
        },
    }))
}

fn player_name_from_landing(landing: PlayerLanding) -> Option<PlayerName> {
    let first = landing.first_name.and_then(|n| n.default)?;
    let last = landing.last_name.and_then(|n| n.default)?;
    Some(PlayerName::new(first, last))
}

// ─── NHL API source ────────────────────────────────────────────────────────

/// [`GameSource`] backed by the public NHL API.
///
/// Every request carries a fixed timeout. Transport faults and upstream
/// server errors retry with multiplicative backoff up to the configured
/// attempt count; a 404 is a permanent not-found and never retries.
pub struct NhlApiSource {
    client: reqwest::Client,
    game_base_url: String,
    stats_base_url: String,
    max_retries: u32,
    retry_initial_delay: Duration,
    retry_backoff: f64,
}

impl NhlApiSource {
    pub fn new(config: &SourceConfig) -> LinemateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| LinemateError::SourceError(e.to_string()))?;
        Ok(NhlApiSource {
            client,
            game_base_url: config.game_base_url.trim_end_matches('/').to_string(),
            stats_base_url: config.stats_base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            retry_backoff: config.retry_backoff,
        })
    }

    /// GET a JSON payload, retrying transient failures. `Ok(None)` on 404.
    async fn get_with_retry<T>(&self, url: &str) -> LinemateResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut delay = self.retry_initial_delay;
        let mut attempt = 0u32;
        loop {
            let fault = match self.client.get(url).send().await {
                Ok(resp) => {
                    if resp.status() == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    match resp.error_for_status() {
                        Ok(resp) => {
                            // A payload that fails to decode will not get
                            // better on retry.
                            let body = resp.json::<T>().await.map_err(|e| {
                                LinemateError::SourceError(format!("{url}: {e}"))
                            })?;
                            return Ok(Some(body));
                        }
                        Err(err) => err.to_string(),
                    }
                }
                Err(err) => err.to_string(),
            };

            attempt += 1;
            if attempt >= self.max_retries {
                return Err(LinemateError::SourceError(format!(
                    "{url}: {fault} (gave up after {attempt} attempts)"
                )));
            }
            tracing::debug!(url, attempt, "retrying upstream fetch: {fault}");
            tokio::time::sleep(delay).await;
            delay = delay.mul_f64(self.retry_backoff);
        }
    }
}

#[async_trait]
impl GameSource for NhlApiSource {
    async fn list_season_game_ids(&self, season: SeasonCode) -> LinemateResult<Vec<GameId>> {
        let url = format!(
            "{}/game?cayenneExp=season={}",
            self.stats_base_url, season
        );
        let listing: Option<SeasonGameList> = self.get_with_retry(&url).await?;
        Ok(listing
            .map(|l| l.data.into_iter().map(|row| row.id).collect())
            .unwrap_or_default())
    }

    async fn fetch_game(&self, game_id: GameId) -> LinemateResult<Option<GameRecord>> {
        let url = format!("{}/gamecenter/{}/boxscore", self.game_base_url, game_id);
        match self.get_with_retry::<Boxscore>(&url).await? {
            Some(boxscore) => game_record_from_boxscore(game_id, boxscore),
            None => Ok(None),
        }
    }

    async fn fetch_player_name(
        &self,
        player_id: PlayerId,
    ) -> LinemateResult<Option<PlayerName>> {
        let url = format!("{}/player/{}/landing", self.game_base_url, player_id);
        match self.get_with_retry::<PlayerLanding>(&url).await? {
            Some(landing) => Ok(player_name_from_landing(landing)),
            None => Ok(None),
        }
    }
}
