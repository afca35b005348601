//! In-crate fakes for engine and scheduler tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bazaar_core::ListingRecord;
use nostr_sdk::{Event, Keys};
use parking_lot::Mutex;
use serde_json::json;

use crate::publish::{PublishOutcome, Publisher, Transport};
use crate::reconcile::Clock;
use crate::source::ListingSource;
use crate::{Error, Result};

/// Source returning whatever snapshot the test set last.
pub struct FakeSource {
    origin: &'static str,
    snapshot: Mutex<std::result::Result<Vec<ListingRecord>, String>>,
    fetches: AtomicU64,
}

impl FakeSource {
    pub fn new(origin: &'static str) -> Self {
        Self {
            origin,
            snapshot: Mutex::new(Ok(Vec::new())),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn set(&self, records: Vec<ListingRecord>) {
        *self.snapshot.lock() = Ok(records);
    }

    pub fn fail(&self, reason: &str) {
        *self.snapshot.lock() = Err(reason.to_string());
    }

    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    fn origin(&self) -> &'static str {
        self.origin
    }

    async fn fetch(&self) -> Result<Vec<ListingRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.snapshot
            .lock()
            .clone()
            .map_err(|reason| Error::fetch(self.origin, reason))
    }
}

#[derive(Default)]
struct TransportState {
    outcomes: VecDeque<PublishOutcome>,
    attempts: Vec<(Event, PublishOutcome)>,
    opens: usize,
    closes: usize,
    fail_open: bool,
}

/// Transport recording every publish. Outcomes are scripted in order, then
/// default to `Accepted`.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = PublishOutcome>) {
        self.state.lock().outcomes.extend(outcomes);
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Events that reached a relay.
    pub fn published(&self) -> Vec<Event> {
        self.state
            .lock()
            .attempts
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(event, _)| event.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().attempts.len()
    }

    pub fn clear(&self) {
        self.state.lock().attempts.clear();
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, _keys: &Keys) -> Result<Box<dyn Publisher>> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(Error::Publish("relays unreachable".to_string()));
        }
        state.opens += 1;
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<TransportState>>,
}

#[async_trait]
impl Publisher for FakeSession {
    async fn publish(&self, event: &Event) -> PublishOutcome {
        let mut state = self.state.lock();
        let outcome = state.outcomes.pop_front().unwrap_or(PublishOutcome::Accepted);
        state.attempts.push((event.clone(), outcome.clone()));
        outcome
    }

    async fn close(&self) {
        self.state.lock().closes += 1;
    }
}

/// Clock moved by hand.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A well-formed HodlHodl offer.
pub fn hodlhodl_offer(id: &str) -> ListingRecord {
    ListingRecord::new(
        id,
        json!({
            "id": id,
            "side": "buy",
            "currency_code": "EUR",
            "max_amount_sats": 100000,
            "min_amount": "10",
            "max_amount": "100",
            "trader": {"login": "trader-".to_string() + id, "trades_count": 3, "rating": "1.0"},
            "payment_method_instructions": [{"payment_method_name": "SEPA"}]
        }),
    )
}

/// A Peach offer settling in `currencies`.
pub fn peach_offer(id: &str, currencies: &[&str]) -> ListingRecord {
    let means: serde_json::Map<String, serde_json::Value> = currencies
        .iter()
        .map(|c| (c.to_string(), json!(["sepa"])))
        .collect();
    let prices: serde_json::Map<String, serde_json::Value> = currencies
        .iter()
        .map(|c| (c.to_string(), json!(100)))
        .collect();

    ListingRecord::new(
        id,
        json!({
            "id": id,
            "type": "bid",
            "userId": "peach-user",
            "amount": 50000,
            "premium": 0,
            "prices": prices,
            "meansOfPayment": means,
        }),
    )
}
