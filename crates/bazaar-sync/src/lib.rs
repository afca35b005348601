//! Marketplace listing mirror for Nostr relays.
//!
//! This crate polls upstream marketplaces, publishes their open offers as
//! replaceable kind-38383 order events and keeps the mirrored set in step
//! with upstream as offers appear, persist and disappear.
//!
//! # Modules
//!
//! - [`source`] - Upstream listing fetchers (HodlHodl, Peach)
//! - [`mapper`] - Listing record to announcement mapping
//! - [`publish`] - Relay publishing sessions
//! - [`store`] - Durable liveness table (SQLite)
//! - [`reconcile`] - The per-cycle diff engine and its scheduler
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ ListingSource   │  Complete snapshot of open offers per origin
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │   Reconciler    │ ───► │  LivenessStore  │  (identifier, origin) → generation
//! └────────┬────────┘      └─────────────────┘
//!          │ new / stale / swept
//!          ▼
//! ┌─────────────────┐
//! │  RecordMapper   │  Listing → announcements (one per currency facet)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Transport    │  Signed events to every configured relay
//! └─────────────────┘
//! ```
//!
//! The store is the source of truth for what has been announced: a listing
//! is only recorded after a relay accepted it, and each cycle's store writes
//! commit in one transaction.

pub mod error;
pub mod mapper;
pub mod origin;
pub mod publish;
pub mod reconcile;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use mapper::{HodlHodlMapper, PeachMapper, RecordMapper};
pub use origin::{BUILTIN_ORIGINS, Origin, OriginRegistry};
pub use publish::{
    PublishOutcome, Publisher, RelayTransport, RelayTransportConfig, Transport,
    normalize_endpoints,
};
pub use reconcile::{
    CancellationPolicy, Clock, CyclePhase, CycleReport, ReconcileConfig, Reconciler, Scheduler,
    SchedulerConfig, SystemClock,
};
pub use source::{HodlHodlConfig, HodlHodlSource, HttpConfig, ListingSource, PeachConfig, PeachSource};
pub use store::{CycleWrites, LivenessRow, LivenessStore};
