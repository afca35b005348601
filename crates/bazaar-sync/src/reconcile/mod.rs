//! Reconciliation of upstream listings against the liveness store.
//!
//! One cycle for one origin moves through these phases:
//!
//! ```text
//! Start ──► Diffing ──► Resolving ──► Sweeping ──► Done
//!   │          │            │             │
//!   │          │            │             └─ commit bumps, inserts, sweep
//!   │          │            └─ publish listings that are new or stale
//!   │          └─ split fetched listings into keep-alive / publish
//!   └─ next generation, fetch snapshot
//! ```
//!
//! After the commit, swept listings get a best-effort cancellation
//! announcement. A failure there never undoes the sweep.

mod engine;
mod scheduler;

pub use engine::Reconciler;
pub use scheduler::{Scheduler, SchedulerConfig};

use std::fmt;
use std::time::Duration;

use nostr_sdk::Timestamp;

/// What to do for listings that disappeared upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CancellationPolicy {
    /// Re-announce the last-known record with status `canceled`.
    #[default]
    Republish,
    /// Only drop the listing from the store; relays expire it.
    Omit,
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How long after its publish a listing still counts as live. Should
    /// not exceed the announcement expiration window.
    pub freshness: Duration,

    pub cancellation: CancellationPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(3600),
            cancellation: CancellationPolicy::Republish,
        }
    }
}

/// Phase of a running cycle, reported when a cycle aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Start,
    Diffing,
    Resolving,
    Sweeping,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Diffing => "diffing",
            Self::Resolving => "resolving",
            Self::Sweeping => "sweeping",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub origin: String,
    pub generation: u64,
    /// Distinct listings in the fetched snapshot.
    pub fetched: usize,
    pub kept_alive: usize,
    /// Listings with at least one announcement accepted.
    pub published: usize,
    /// Listings whose announcements all failed; retried next cycle.
    pub publish_failed: usize,
    pub mapping_failed: usize,
    pub swept: usize,
    /// Swept listings whose cancellation reached a relay.
    pub canceled: usize,
}

/// Source of the current unix time.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Timestamp::now().as_u64()
    }
}
