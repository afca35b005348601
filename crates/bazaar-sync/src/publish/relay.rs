//! nostr-sdk backed transport.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::{Client, Event, Keys, RelayStatus, RelayUrl};

use super::{PublishOutcome, Publisher, Transport};
use crate::{Error, Result};

/// NIP-01 machine-readable prefix for already-stored events.
const DUPLICATE_PREFIX: &str = "duplicate:";

/// Configuration for the relay transport.
#[derive(Debug, Clone)]
pub struct RelayTransportConfig {
    /// Normalized relay endpoints (see [`super::normalize_endpoints`]).
    pub relays: Vec<String>,

    /// How long to wait for connections after connecting.
    pub connect_wait: Duration,
}

/// Publishes through a nostr-sdk [`Client`] per session.
pub struct RelayTransport {
    config: RelayTransportConfig,
}

impl RelayTransport {
    pub fn new(config: RelayTransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn open(&self, keys: &Keys) -> Result<Box<dyn Publisher>> {
        let client = Client::new(keys.clone());

        let mut added = 0usize;
        for relay_url in &self.config.relays {
            match client.add_relay(relay_url.as_str()).await {
                Ok(_) => added += 1,
                Err(e) => tracing::warn!("Failed to add relay {}: {}", relay_url, e),
            }
        }

        if added == 0 {
            return Err(Error::Publish("no relay could be added".to_string()));
        }

        client.connect().await;

        // Wait a bit for connections to establish
        tokio::time::sleep(self.config.connect_wait).await;

        let relays = client.relays().await;
        let connected = relays
            .values()
            .filter(|relay| relay.status() == RelayStatus::Connected)
            .count();
        tracing::debug!("Connected to {}/{} relays", connected, added);

        Ok(Box::new(RelaySession { client }))
    }
}

struct RelaySession {
    client: Client,
}

#[async_trait]
impl Publisher for RelaySession {
    async fn publish(&self, event: &Event) -> PublishOutcome {
        match self.client.send_event(event).await {
            Ok(output) => classify_output(output.success.len(), &output.failed),
            Err(e) => classify_error(&e.to_string()),
        }
    }

    async fn close(&self) {
        self.client.disconnect().await;
    }
}

/// Classify a send by per-relay results.
fn classify_output(accepted: usize, failed: &HashMap<RelayUrl, String>) -> PublishOutcome {
    classify(accepted, failed.values().map(String::as_str))
}

fn classify<'a>(accepted: usize, rejections: impl Iterator<Item = &'a str>) -> PublishOutcome {
    if accepted > 0 {
        return PublishOutcome::Accepted;
    }

    let rejections: Vec<&str> = rejections.collect();
    if !rejections.is_empty() && rejections.iter().all(|r| r.starts_with(DUPLICATE_PREFIX)) {
        return PublishOutcome::Duplicate;
    }

    if rejections.is_empty() {
        PublishOutcome::Failed("no relay responded".to_string())
    } else {
        PublishOutcome::Failed(rejections.join("; "))
    }
}

/// Classify a send that failed outright.
fn classify_error(message: &str) -> PublishOutcome {
    if message.to_ascii_lowercase().contains("duplicate") {
        PublishOutcome::Duplicate
    } else {
        PublishOutcome::Failed(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_acceptance_wins() {
        let outcome = classify(1, ["blocked: spam"].into_iter());
        assert_eq!(outcome, PublishOutcome::Accepted);
    }

    #[test]
    fn test_all_duplicates() {
        let outcome = classify(
            0,
            ["duplicate: have it", "duplicate: already stored"].into_iter(),
        );
        assert_eq!(outcome, PublishOutcome::Duplicate);
    }

    #[test]
    fn test_mixed_rejections_fail() {
        let outcome = classify(0, ["duplicate: have it", "blocked: no"].into_iter());
        assert!(matches!(outcome, PublishOutcome::Failed(ref m) if m.contains("blocked")));
    }

    #[test]
    fn test_no_responses_fail() {
        assert!(!classify(0, std::iter::empty()).is_success());
    }

    #[test]
    fn test_classify_output_map() {
        let mut failed = HashMap::new();
        failed.insert(
            RelayUrl::parse("wss://relay.example.com").unwrap(),
            "duplicate: exists".to_string(),
        );
        assert_eq!(classify_output(0, &failed), PublishOutcome::Duplicate);
    }

    #[test]
    fn test_classify_error() {
        assert_eq!(
            classify_error("event rejected: Duplicate event"),
            PublishOutcome::Duplicate
        );
        assert!(matches!(
            classify_error("relay not connected"),
            PublishOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_open_without_relays_fails() {
        let transport = RelayTransport::new(RelayTransportConfig {
            relays: Vec::new(),
            connect_wait: Duration::from_millis(0),
        });
        assert!(matches!(
            transport.open(&Keys::generate()).await,
            Err(Error::Publish(_))
        ));
    }
}
