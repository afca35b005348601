//! Error types for the sync daemon.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mirroring listings.
///
/// Every variant is scoped to one origin's cycle; none of them stop the
/// other origins. Per-record mapping failures stay `bazaar_core::Error` and
/// never abort a cycle.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error from the liveness store.
    #[error("Database error: {0}")]
    Database(String),

    /// Upstream listings could not be retrieved completely.
    #[error("Fetch error ({origin}): {reason}")]
    Fetch {
        /// Origin whose source failed.
        origin: String,
        /// What went wrong.
        reason: String,
    },

    /// HTTP transport error while talking to an upstream API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay session could not be opened.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a fetch error for an origin.
    pub fn fetch(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
