//! Liveness tracking for mirrored listings.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         LivenessStore                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  - One row per (identifier, origin) currently mirrored          │
//! │  - first_seen: when the listing was last (re)announced          │
//! │  - generation: per-origin logical clock, bumped when seen       │
//! │  - Sweep deletes rows not seen in the current generation        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bazaar_sync::store::{CycleWrites, LivenessStore};
//!
//! let store = LivenessStore::open("./data/nostr_sync.db")?;
//!
//! let next = store.max_generation("hodlhodl")? + 1;
//! let mut writes = CycleWrites::new("hodlhodl", next);
//! writes.keep_alive("1234");
//! writes.insert("5678", now, Some(record));
//!
//! // Bumps, inserts and the sweep commit together
//! let swept = store.commit_cycle(&writes)?;
//! ```

mod liveness;
mod schema;

pub use liveness::{CycleWrites, LivenessRow, LivenessStore};
