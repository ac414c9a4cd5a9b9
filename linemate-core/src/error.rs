//! Error types for linemate.

use crate::types::{GameId, PlayerId};

/// The primary error type used throughout the linemate engine.
#[derive(Debug, thiserror::Error)]
pub enum LinemateError {
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("no path between player {0} and player {1}")]
    PathNotFound(PlayerId, PlayerId),

    #[error("no players match the given filters")]
    NoPlayersMatch,

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("invalid session request: {0}")]
    InvalidSession(String),

    #[error("game {0} missing required data: {1}")]
    IncompleteGame(GameId, String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("upstream source error: {0}")]
    SourceError(String),

    #[error("store transaction failed after {attempts} attempts: {reason}")]
    TxnFailed { attempts: u32, reason: String },

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for `Result<T, LinemateError>`.
pub type LinemateResult<T> = Result<T, LinemateError>;
