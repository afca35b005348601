//! Event publishing to Nostr relays.
//!
//! A [`Transport`] opens one [`Publisher`] session per cycle and origin. The
//! session is signed in as that origin's keys and pushes events to every
//! configured relay.
//!
//! Publishing never returns an error: each event yields a [`PublishOutcome`]
//! which the engine uses to decide whether a listing counts as announced.

mod endpoint;
mod relay;

pub use endpoint::{normalize_endpoint, normalize_endpoints};
pub use relay::{RelayTransport, RelayTransportConfig};

use std::fmt;

use async_trait::async_trait;
use nostr_sdk::{Event, Keys};

use crate::Result;

/// Result of publishing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// At least one relay stored the event.
    Accepted,
    /// Relays already hold this event (or a newer replacement).
    Duplicate,
    /// No relay took the event.
    Failed(String),
}

impl PublishOutcome {
    /// Accepted and Duplicate both mean the event is at the relays.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted | Self::Duplicate)
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Opens publisher sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session authenticated with `keys`.
    async fn open(&self, keys: &Keys) -> Result<Box<dyn Publisher>>;
}

/// An open publishing session.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: &Event) -> PublishOutcome;

    /// Release the session's connections.
    async fn close(&self);
}
