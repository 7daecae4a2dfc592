//! Error types shared by the store, the dispatcher and the HTTP layer

use thiserror::Error;

/// Failures reported by a [`TimerStore`](crate::services::TimerStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Store lock poisoned: {0}")]
    Poisoned(String),
}

/// Errors surfaced by the dispatcher and timer operations
#[derive(Debug, Error)]
pub enum TimerError {
    /// Referenced timer id is not in the store
    #[error("Timer {0} not found")]
    NotFound(i64),

    /// Inbound event carried an unparseable or missing parameter
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Persistence read/write failure
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    /// Wakeup registration could not be changed
    #[error("Wakeup service failure: {0}")]
    Wakeup(String),

    /// Shared in-memory state could not be locked
    #[error("Failed to lock {0}")]
    Lock(String),

    /// Edit session is gone or did not answer
    #[error("Edit session for timer {0} is unavailable")]
    SessionClosed(i64),
}

pub type Result<T, E = TimerError> = std::result::Result<T, E>;
