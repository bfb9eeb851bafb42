use std::time::Duration;

use engine::OracleError;

use crate::persistence::PersistenceError;

/// Failures surfaced by session and rating operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("No moves: {0}")]
    NoMoves(String),
    #[error("No active session: {0}")]
    NoActiveSession(String),
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("Oracle did not answer within {0:?}")]
    OracleTimeout(Duration),
    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),
}

impl SessionError {
    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::InvalidMove(_) => "invalid_move",
            Self::NoMoves(_) => "no_moves",
            Self::NoActiveSession(_) => "no_active_session",
            Self::OracleUnavailable(_) => "oracle_unavailable",
            Self::OracleTimeout(_) => "oracle_timeout",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<PersistenceError> for SessionError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Persistence(other),
        }
    }
}

impl From<OracleError> for SessionError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout(after) => Self::OracleTimeout(after),
            OracleError::Unavailable(msg) => Self::OracleUnavailable(msg),
            OracleError::InvalidPosition(msg) => {
                Self::OracleUnavailable(format!("oracle rejected position: {msg}"))
            }
        }
    }
}
