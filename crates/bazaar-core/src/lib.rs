//! Core types and shared utilities for the bazaar listing mirror.
//!
//! This crate provides:
//! - The normalized upstream [`ListingRecord`]
//! - [`Announcement`] events (kind 38383), their wire tags and signing
//! - Coordinate derivation for replaceable publishes
//! - Prometheus metrics helpers
//! - Shared error types

pub mod announcement;
mod error;
mod listing;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Event kind of order announcements (parameterized replaceable range).
pub const ANNOUNCEMENT_KIND: u16 = 38383;

/// Record category carried in the `z` tag.
pub const RECORD_CATEGORY: &str = "order";

/// Default settlement network (`network` tag).
pub const DEFAULT_NETWORK: &str = "mainnet";

/// Default settlement layer (`layer` tag).
pub const DEFAULT_LAYER: &str = "onchain";

pub use announcement::{Announcement, Coordinate, OrderStatus, Rating, Side, tag_values};
pub use error::{Error, Result};
pub use listing::{ListingRecord, scalar_to_string};
