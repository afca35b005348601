//! Peach Bitcoin offers source.
//!
//! The nostr search endpoint returns every open offer in a single response.

use async_trait::async_trait;
use bazaar_core::ListingRecord;
use serde_json::Value;

use super::{HttpConfig, ListingSource, records_from_offers};
use crate::{Error, Result};

/// Origin name of the Peach marketplace.
pub const ORIGIN: &str = "peach";

/// Configuration for the Peach source.
#[derive(Debug, Clone)]
pub struct PeachConfig {
    /// Offer search endpoint.
    pub base_url: String,
}

impl Default for PeachConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.peachbitcoin.com/v1/offer/search/nostr".to_string(),
        }
    }
}

/// Peach listing source.
pub struct PeachSource {
    config: PeachConfig,
    client: reqwest::Client,
}

impl PeachSource {
    pub fn new(config: PeachConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http.build_client()?,
        })
    }
}

/// Pull the `offers` array out of a search response body.
fn extract_offers(mut body: Value) -> Result<Vec<Value>> {
    match body.get_mut("offers").map(Value::take) {
        Some(Value::Array(offers)) => Ok(offers),
        Some(other) => Err(Error::fetch(
            ORIGIN,
            format!("offers is not an array: {}", other),
        )),
        None => Err(Error::fetch(ORIGIN, "response has no offers")),
    }
}

#[async_trait]
impl ListingSource for PeachSource {
    fn origin(&self) -> &'static str {
        ORIGIN
    }

    async fn fetch(&self) -> Result<Vec<ListingRecord>> {
        tracing::debug!(origin = ORIGIN, "Fetching {}", self.config.base_url);

        let response = self
            .client
            .get(&self.config.base_url)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(ORIGIN, format!("HTTP {}", status)));
        }

        let offers = extract_offers(response.json().await?)?;
        tracing::info!(origin = ORIGIN, "Found {} Peach offers", offers.len());

        Ok(records_from_offers(ORIGIN, offers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;

    #[test]
    fn test_extract_offers() {
        let offers = extract_offers(json!({"offers": [{"id": "a"}, {"id": "b"}]})).unwrap();
        assert_eq!(offers.len(), 2);
    }

    #[test]
    fn test_extract_offers_missing() {
        assert!(matches!(
            extract_offers(json!({"error": "nope"})),
            Err(Error::Fetch { .. })
        ));
        assert!(extract_offers(json!({"offers": null})).is_err());
    }

    #[test]
    fn test_extract_offers_empty_is_valid() {
        assert!(extract_offers(json!({"offers": []})).unwrap().is_empty());
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/search", addr)
    }

    #[tokio::test]
    async fn test_fetch_single_page() {
        let app = Router::new().route(
            "/search",
            get(|| async { Json(json!({"offers": [{"id": "p1"}, {"id": "p2"}]})) }),
        );
        let source = PeachSource::new(
            PeachConfig {
                base_url: serve(app).await,
            },
            &HttpConfig::default(),
        )
        .unwrap();

        let records = source.fetch().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let app = Router::new().route(
            "/search",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let source = PeachSource::new(
            PeachConfig {
                base_url: serve(app).await,
            },
            &HttpConfig::default(),
        )
        .unwrap();

        assert!(matches!(source.fetch().await, Err(Error::Fetch { .. })));
    }
}
