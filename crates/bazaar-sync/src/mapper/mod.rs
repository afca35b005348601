//! Record mappers: upstream listing records to order announcements.
//!
//! A mapper is pure. Given the same record, status and timestamp it always
//! yields the same announcements, which is what lets the engine re-derive a
//! cancellation from the record persisted at publish time.
//!
//! Listings that settle in several currencies fan out into one announcement
//! per currency (the facet), each with its own coordinate.

mod hodlhodl;
mod peach;

pub use hodlhodl::HodlHodlMapper;
pub use peach::PeachMapper;

use std::time::Duration;

use bazaar_core::{Announcement, ListingRecord, OrderStatus};

/// Default lifetime of an announcement at the relays.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(3600);

/// Converts an origin's listing records into announcements.
pub trait RecordMapper: Send + Sync {
    /// Origin this mapper understands.
    fn origin(&self) -> &'static str;

    /// Map one record. Returns at least one announcement on success.
    fn map(
        &self,
        record: &ListingRecord,
        status: OrderStatus,
        created_at: u64,
    ) -> bazaar_core::Result<Vec<Announcement>>;
}
