//! Error types for listing mapping and announcement building.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a listing into announcements.
///
/// These are record-scoped: a mapping failure for one listing never affects
/// the other listings of the same batch.
#[derive(Error, Debug)]
pub enum Error {
    /// A field the mapper needs is absent from the upstream record.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// A field is present but has an unusable value.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// The name of the invalid field.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// Unknown order status string.
    #[error("unknown order status '{0}'")]
    UnknownStatus(String),

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A tag could not be built.
    #[error("tag error: {0}")]
    Tag(String),

    /// Event signing failed.
    #[error("signing error: {0}")]
    Signing(String),
}
