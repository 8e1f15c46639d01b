//! Worker error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    /// Reading from or writing to the engine pipes failed
    #[error("Engine I/O failed: {0}")]
    EngineIo(String),

    #[error("Engine process exited unexpectedly")]
    EngineCrashed,

    #[error("Engine did not respond within {0}s")]
    EngineTimeout(u64),

    #[error("Search cancelled")]
    SearchCancelled,

    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("No games found for this user")]
    NoGamesFound,

    #[error("Invalid game: {0}")]
    InvalidGame(#[from] chess_core::PgnError),

    #[error("Analysis incomplete at ply {ply}: {reason}")]
    AnalysisPartial { ply: usize, reason: String },

    #[error("Job not found")]
    JobNotFound,

    #[error("Job belongs to another owner")]
    OwnershipMismatch,

    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    /// Not-found and foreign-owner jobs look the same to callers
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkerError::JobNotFound | WorkerError::OwnershipMismatch)
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkerError::SearchCancelled)
    }

    /// Failures after which the engine session must not be reused
    pub fn kills_session(&self) -> bool {
        matches!(
            self,
            WorkerError::EngineCrashed | WorkerError::EngineTimeout(_) | WorkerError::EngineIo(_)
        )
    }
}
