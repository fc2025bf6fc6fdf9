//! Error types for fetching and scheduling.

use thiserror::Error;

use crate::scheduler::SchedulerState;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a snapshot fetch produced no events.
///
/// Caught at the scheduler boundary; it never reaches the held collection.
#[derive(Error, Debug)]
pub enum FetchFailure {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection, TLS, or body transfer error.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("collector returned HTTP {status}")]
    Status { status: u16 },

    /// The body was not a JSON array of events.
    #[error("malformed snapshot body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors from configuration and scheduler lifecycle.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction error.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Lifecycle call made from the wrong state.
    #[error("cannot {action} a scheduler that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SchedulerState,
    },
}
