//! Relay endpoint normalization.
//!
//! Endpoints are checked once at startup so a typo surfaces as a
//! configuration error instead of a relay that silently never accepts.
//!
//! # Normalization Rules
//!
//! - Trim surrounding whitespace
//! - Require a websocket scheme (wss:// or ws://)
//! - Parse with nostr-sdk's `RelayUrl` (lowercases scheme and host)
//! - Remove trailing slashes
//! - Drop duplicates, keeping first occurrence order

use nostr_sdk::RelayUrl;

use crate::{Error, Result};

/// Normalize a single relay endpoint.
///
/// ```ignore
/// assert_eq!(
///     normalize_endpoint("wss://Relay.Example.COM/")?,
///     "wss://relay.example.com"
/// );
/// ```
pub fn normalize_endpoint(url: &str) -> Result<String> {
    let url = url.trim();

    if !url.starts_with("wss://") && !url.starts_with("ws://") {
        return Err(Error::Config(format!(
            "relay endpoint '{}' must start with wss:// or ws://",
            url
        )));
    }

    let parsed = RelayUrl::parse(url)
        .map_err(|e| Error::Config(format!("invalid relay endpoint '{}': {}", url, e)))?;

    let mut normalized = parsed.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }

    Ok(normalized)
}

/// Normalize a list of relay endpoints, removing duplicates.
///
/// Any invalid endpoint fails the whole list. An empty result is an error:
/// there would be nowhere to publish.
pub fn normalize_endpoints<S: AsRef<str>>(urls: &[S]) -> Result<Vec<String>> {
    let mut endpoints: Vec<String> = Vec::with_capacity(urls.len());

    for url in urls {
        let url = url.as_ref();
        if url.trim().is_empty() {
            continue;
        }
        let normalized = normalize_endpoint(url)?;
        if !endpoints.contains(&normalized) {
            endpoints.push(normalized);
        }
    }

    if endpoints.is_empty() {
        return Err(Error::Config("no relay endpoints configured".to_string()));
    }

    Ok(endpoints)
}
