//! Configuration system for linemate.

use serde::Deserialize;
use std::path::PathBuf;

/// Top-level linemate configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinemateConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub ingest: IngestConfig,
    pub store: StoreConfig,
    pub game: GameConfig,
}

impl Default for LinemateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            source: SourceConfig::default(),
            ingest: IngestConfig::default(),
            store: StoreConfig::default(),
            game: GameConfig::default(),
        }
    }
}

impl LinemateConfig {
    /// Load configuration from a TOML file, with environment variable overrides.
    ///
    /// Environment variables use the `LINEMATE_` prefix and `_` separators.
    /// E.g. `LINEMATE_SERVER_PORT=9000`.
    pub fn load(path: Option<&str>) -> Result<Self, crate::error::LinemateError> {
        let mut config = if let Some(path) = path {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                crate::error::LinemateError::InvalidConfig(format!(
                    "failed to read config file '{path}': {e}"
                ))
            })?;
            toml::from_str::<LinemateConfig>(&contents).map_err(|e| {
                crate::error::LinemateError::InvalidConfig(format!("failed to parse config: {e}"))
            })?
        } else {
            LinemateConfig::default()
        };

        // Apply environment variable overrides.
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LINEMATE_SERVER_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("LINEMATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Ok(v) = std::env::var("LINEMATE_SOURCE_GAME_BASE_URL") {
            self.source.game_base_url = v;
        }
        if let Ok(v) = std::env::var("LINEMATE_SOURCE_STATS_BASE_URL") {
            self.source.stats_base_url = v;
        }
        if let Ok(v) = std::env::var("LINEMATE_INGEST_MAX_CONCURRENT_GAMES") {
            if let Ok(n) = v.parse() {
                self.ingest.max_concurrent_games = n;
            }
        }
        if let Ok(v) = std::env::var("LINEMATE_STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LINEMATE_GAME_TEAM_USE_LIMIT") {
            if let Ok(n) = v.parse() {
                self.game.team_use_limit = n;
            }
        }
    }

    fn validate(&self) -> Result<(), crate::error::LinemateError> {
        if self.server.port == 0 {
            return Err(crate::error::LinemateError::InvalidConfig(
                "server.port must be > 0".into(),
            ));
        }
        if self.ingest.max_concurrent_games == 0 {
            return Err(crate::error::LinemateError::InvalidConfig(
                "ingest.max_concurrent_games must be > 0".into(),
            ));
        }
        if self.ingest.seasons.is_empty() {
            return Err(crate::error::LinemateError::InvalidConfig(
                "ingest.seasons must not be empty".into(),
            ));
        }
        if self.source.retry_backoff < 1.0 {
            return Err(crate::error::LinemateError::InvalidConfig(
                "source.retry_backoff must be >= 1.0".into(),
            ));
        }
        if self.store.txn_max_retries == 0 {
            return Err(crate::error::LinemateError::InvalidConfig(
                "store.txn_max_retries must be > 0".into(),
            ));
        }
        if self.game.team_use_limit == 0 {
            return Err(crate::error::LinemateError::InvalidConfig(
                "game.team_use_limit must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Mailbox depth for each session worker.
    pub session_buffer: usize,
    /// Broadcast capacity for each live-game room.
    pub room_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8470,
            session_buffer: 64,
            room_buffer: 128,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL for per-game endpoints (boxscore, landing).
    pub game_base_url: String,
    /// Base URL for the season game listing endpoint.
    pub stats_base_url: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_backoff: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            game_base_url: "https://api-web.nhle.com/v1".into(),
            stats_base_url: "https://api.nhle.com/stats/rest/en".into(),
            request_timeout_ms: 10_000,
            max_retries: 3,
            retry_initial_delay_ms: 1_000,
            retry_backoff: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Upper bound on games fetched and written concurrently.
    pub max_concurrent_games: usize,
    /// Season starting years covered by a full ingest run.
    pub seasons: Vec<u32>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_games: 25,
            seasons: vec![2021, 2022, 2023, 2024],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub snapshot_enabled: bool,
    pub snapshots_to_keep: usize,
    /// Attempts before a write transaction gives up on lock acquisition.
    pub txn_max_retries: u32,
    pub txn_backoff_base_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./linemate-data"),
            snapshot_enabled: true,
            snapshots_to_keep: 3,
            txn_max_retries: 5,
            txn_backoff_base_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Times a single team token may justify an accepted guess per session.
    pub team_use_limit: u32,
    /// Depth cutoff for interactive shortest-path lookups.
    pub max_path_depth: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            team_use_limit: 3,
            max_path_depth: 10,
        }
    }
}
