//! Upstream listing source adapters.
//!
//! Each adapter fetches the complete current set of offers from one
//! marketplace and returns them as normalized [`ListingRecord`]s.
//!
//! # Available Sources
//!
//! - [`HodlHodlSource`] - Paginated HodlHodl offers API
//! - [`PeachSource`] - Peach Bitcoin offer search endpoint
//!
//! # Snapshot Contract
//!
//! A fetch either returns a complete snapshot or fails. Returning a partial
//! list would make the engine sweep listings that are still open upstream,
//! so any page failure aborts the whole fetch.

pub(crate) mod hodlhodl;
pub(crate) mod peach;

pub use hodlhodl::{HodlHodlConfig, HodlHodlSource};
pub use peach::{PeachConfig, PeachSource};

use std::time::Duration;

use async_trait::async_trait;
use bazaar_core::ListingRecord;
use serde_json::Value;

use crate::Result;

/// A source of upstream listings for one origin.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Origin name (used in the liveness store, logs and metrics).
    fn origin(&self) -> &'static str;

    /// Fetch every listing currently open upstream.
    async fn fetch(&self) -> Result<Vec<ListingRecord>>;
}

/// HTTP settings shared by the built-in sources.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header sent upstream.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("bazaar-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Build a reqwest client from these settings.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;
        Ok(client)
    }
}

/// Turn raw offer objects into records, skipping offers without an id.
///
/// Offers lacking an identifier cannot be tracked; they are logged and
/// dropped without failing the snapshot.
pub(crate) fn records_from_offers(origin: &str, offers: Vec<Value>) -> Vec<ListingRecord> {
    let total = offers.len();
    let records: Vec<ListingRecord> = offers
        .into_iter()
        .filter_map(|offer| match ListingRecord::from_offer(offer) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(origin, "Dropping offer without usable id: {}", e);
                None
            }
        })
        .collect();

    if records.len() < total {
        metrics::counter!("mirror_mapping_errors_total", "origin" => origin.to_string())
            .increment((total - records.len()) as u64);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_from_offers_skips_missing_ids() {
        let offers = vec![json!({"id": "a"}), json!({"side": "buy"}), json!({"id": 7})];
        let records = records_from_offers("test", offers);
        let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a", "7"]);
    }

    #[test]
    fn test_http_config_builds_client() {
        let config = HttpConfig::default();
        assert!(config.user_agent.starts_with("bazaar-sync/"));
        assert!(config.build_client().is_ok());
    }
}
