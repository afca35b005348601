//! HodlHodl offers source.
//!
//! Pages through `GET /api/v1/offers` with limit/offset pagination until a
//! page comes back shorter than the limit.

use async_trait::async_trait;
use bazaar_core::ListingRecord;
use serde::Deserialize;
use serde_json::Value;

use super::{HttpConfig, ListingSource, records_from_offers};
use crate::{Error, Result};

/// Origin name of the HodlHodl marketplace.
pub const ORIGIN: &str = "hodlhodl";

/// Configuration for the HodlHodl source.
#[derive(Debug, Clone)]
pub struct HodlHodlConfig {
    /// Offers endpoint.
    pub base_url: String,

    /// Offers requested per page.
    pub page_size: usize,

    /// Upper bound on pages per fetch. Reaching it fails the fetch, since
    /// the snapshot would be incomplete.
    pub max_pages: usize,
}

impl Default for HodlHodlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hodlhodl.com/api/v1/offers".to_string(),
            page_size: 100,
            max_pages: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OffersPage {
    status: Option<String>,
    #[serde(default)]
    offers: Vec<Value>,
}

/// HodlHodl listing source.
pub struct HodlHodlSource {
    config: HodlHodlConfig,
    client: reqwest::Client,
}

impl HodlHodlSource {
    pub fn new(config: HodlHodlConfig, http: &HttpConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(Error::Config("HodlHodl page size must be positive".into()));
        }

        Ok(Self {
            config,
            client: http.build_client()?,
        })
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<Value>> {
        let url = format!(
            "{}?pagination[limit]={}&pagination[offset]={}",
            self.config.base_url, self.config.page_size, offset
        );
        tracing::debug!(origin = ORIGIN, "Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(ORIGIN, format!("HTTP {} for {}", status, url)));
        }

        let page: OffersPage = response.json().await?;
        parse_page(page)
    }
}

fn parse_page(page: OffersPage) -> Result<Vec<Value>> {
    match page.status.as_deref() {
        Some("success") => Ok(page.offers),
        other => Err(Error::fetch(
            ORIGIN,
            format!("unexpected response status {:?}", other),
        )),
    }
}

#[async_trait]
impl ListingSource for HodlHodlSource {
    fn origin(&self) -> &'static str {
        ORIGIN
    }

    async fn fetch(&self) -> Result<Vec<ListingRecord>> {
        let mut offers = Vec::new();
        let mut offset = 0;

        for _ in 0..self.config.max_pages {
            let page = self.fetch_page(offset).await?;
            let page_len = page.len();
            offers.extend(page);

            if page_len < self.config.page_size {
                tracing::info!(origin = ORIGIN, "Found {} HodlHodl offers", offers.len());
                return Ok(records_from_offers(ORIGIN, offers));
            }

            offset += self.config.page_size;
        }

        Err(Error::fetch(
            ORIGIN,
            format!("more than {} pages of offers", self.config.max_pages),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_parse_page_success() {
        let page: OffersPage =
            serde_json::from_value(json!({"status": "success", "offers": [{"id": "1"}]})).unwrap();
        assert_eq!(parse_page(page).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_page_failure_status() {
        let page: OffersPage =
            serde_json::from_value(json!({"status": "fail", "offers": []})).unwrap();
        assert!(matches!(parse_page(page), Err(Error::Fetch { .. })));
    }

    #[test]
    fn test_parse_page_missing_status() {
        let page: OffersPage = serde_json::from_value(json!({"offers": []})).unwrap();
        assert!(parse_page(page).is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = HodlHodlConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(HodlHodlSource::new(config, &HttpConfig::default()).is_err());
    }

    /// Serve `total` offers, paginated like the real API.
    async fn serve_offers(total: usize, fail_offset: Option<usize>) -> String {
        let app = Router::new().route(
            "/offers",
            get(move |Query(params): Query<HashMap<String, String>>| async move {
                let limit: usize = params["pagination[limit]"].parse().unwrap();
                let offset: usize = params["pagination[offset]"].parse().unwrap();
                if Some(offset) == fail_offset {
                    return Json(json!({"status": "fail"}));
                }
                let offers: Vec<Value> = (offset..total.min(offset + limit))
                    .map(|i| json!({"id": i.to_string()}))
                    .collect();
                Json(json!({"status": "success", "offers": offers}))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/offers", addr)
    }

    #[tokio::test]
    async fn test_fetch_walks_all_pages() {
        let base_url = serve_offers(25, None).await;
        let source = HodlHodlSource::new(
            HodlHodlConfig {
                base_url,
                page_size: 10,
                max_pages: 10,
            },
            &HttpConfig::default(),
        )
        .unwrap();

        let records = source.fetch().await.unwrap();
        assert_eq!(records.len(), 25);
        assert_eq!(records[0].identifier, "0");
        assert_eq!(records[24].identifier, "24");
    }

    #[tokio::test]
    async fn test_fetch_exact_multiple_of_page_size() {
        let base_url = serve_offers(20, None).await;
        let source = HodlHodlSource::new(
            HodlHodlConfig {
                base_url,
                page_size: 10,
                max_pages: 10,
            },
            &HttpConfig::default(),
        )
        .unwrap();

        // Third page is empty and terminates the walk
        assert_eq!(source.fetch().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_fetch_fails_on_bad_page() {
        let base_url = serve_offers(25, Some(10)).await;
        let source = HodlHodlSource::new(
            HodlHodlConfig {
                base_url,
                page_size: 10,
                max_pages: 10,
            },
            &HttpConfig::default(),
        )
        .unwrap();

        // A failed second page must not yield a partial snapshot
        assert!(matches!(source.fetch().await, Err(Error::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_fetch_fails_past_max_pages() {
        let base_url = serve_offers(100, None).await;
        let source = HodlHodlSource::new(
            HodlHodlConfig {
                base_url,
                page_size: 10,
                max_pages: 3,
            },
            &HttpConfig::default(),
        )
        .unwrap();

        assert!(source.fetch().await.is_err());
    }
}
