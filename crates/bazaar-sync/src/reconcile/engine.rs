//! The reconciliation engine.
//!
//! [`Reconciler::run_cycle`] runs one cycle for one origin. It is the only
//! writer of the liveness store. All store writes of a cycle land in a
//! single transaction, so a failure at any point leaves the store exactly as
//! the previous cycle left it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use bazaar_core::{ListingRecord, OrderStatus};
use metrics::{counter, gauge, histogram};
use nostr_sdk::{Event, Keys};

use super::{CancellationPolicy, Clock, CyclePhase, CycleReport, ReconcileConfig, SystemClock};
use crate::origin::Origin;
use crate::publish::{PublishOutcome, Publisher, Transport};
use crate::store::{CycleWrites, LivenessRow, LivenessStore};
use crate::{Error, Result};

/// Drives reconciliation cycles.
pub struct Reconciler {
    store: Arc<LivenessStore>,
    transport: Arc<dyn Transport>,
    config: ReconcileConfig,
    clock: Arc<dyn Clock>,
}

/// Result of announcing one listing.
enum Announced {
    /// At least one announcement reached a relay.
    Published,
    /// Every announcement failed to publish.
    Failed(String),
    /// The record could not be turned into announcements.
    Unmappable(bazaar_core::Error),
}

impl Reconciler {
    pub fn new(
        store: Arc<LivenessStore>,
        transport: Arc<dyn Transport>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &LivenessStore {
        &self.store
    }

    /// Run one cycle for `origin`.
    ///
    /// An error aborts only this origin's cycle. Nothing from an aborted
    /// cycle is persisted.
    pub async fn run_cycle(&self, origin: &Origin) -> Result<CycleReport> {
        let started = Instant::now();
        let mut phase = CyclePhase::Start;

        let result = self.reconcile(origin, &mut phase).await;

        histogram!("mirror_cycle_duration_seconds", "origin" => origin.name.clone())
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(report) => {
                counter!("mirror_cycles_total", "origin" => origin.name.clone(), "result" => "ok")
                    .increment(1);
                gauge!("mirror_generation", "origin" => origin.name.clone())
                    .set(report.generation as f64);

                tracing::info!(
                    origin = %origin.name,
                    generation = report.generation,
                    "Cycle complete: {} fetched, {} kept alive, {} published, {} failed, \
                     {} unmappable, {} swept, {} canceled in {:?}",
                    report.fetched,
                    report.kept_alive,
                    report.published,
                    report.publish_failed,
                    report.mapping_failed,
                    report.swept,
                    report.canceled,
                    started.elapsed()
                );
            }
            Err(e) => {
                counter!("mirror_cycles_total", "origin" => origin.name.clone(), "result" => "error")
                    .increment(1);
                tracing::error!(origin = %origin.name, %phase, "Cycle aborted: {}", e);
            }
        }

        result
    }

    /// Apply a cycle's writes on the blocking pool so other origins' tasks
    /// keep running during the transaction.
    async fn commit(&self, writes: CycleWrites) -> Result<Vec<LivenessRow>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.commit_cycle(&writes))
            .await
            .map_err(|e| Error::Database(format!("Commit task failed: {}", e)))?
    }

    async fn reconcile(&self, origin: &Origin, phase: &mut CyclePhase) -> Result<CycleReport> {
        let name = origin.name.as_str();
        let generation = self.store.max_generation(name)? + 1;
        let mut report = CycleReport {
            origin: name.to_string(),
            generation,
            ..Default::default()
        };

        let records = origin.source.fetch().await?;
        let now = self.clock.now();

        // Diffing
        *phase = CyclePhase::Diffing;
        let mut writes = CycleWrites::new(name, generation);
        let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
        let mut candidates: Vec<&ListingRecord> = Vec::new();

        for record in &records {
            if !seen.insert(record.identifier.as_str()) {
                tracing::debug!(origin = name, "Duplicate listing {} in snapshot", record.identifier);
                continue;
            }

            if self
                .store
                .is_live(&record.identifier, name, self.config.freshness, now)?
            {
                writes.keep_alive(record.identifier.as_str());
            } else {
                candidates.push(record);
            }
        }

        report.fetched = seen.len();
        report.kept_alive = writes.kept_alive();
        counter!("mirror_listings_fetched_total", "origin" => name.to_string())
            .increment(report.fetched as u64);
        tracing::debug!(
            origin = name,
            generation,
            "{} listings to keep alive, {} to publish",
            report.kept_alive,
            candidates.len()
        );

        // Resolving
        *phase = CyclePhase::Resolving;
        let mut session = LazySession::new(self.transport.as_ref(), &origin.keys, name);

        for record in candidates {
            match announce(origin, &mut session, record, OrderStatus::Pending, now).await {
                Announced::Published => {
                    writes.insert(record.identifier.as_str(), now, Some(record.clone()));
                    report.published += 1;
                }
                Announced::Failed(reason) => {
                    tracing::warn!(
                        origin = name,
                        "Publishing {} failed, retrying next cycle: {}",
                        record.identifier,
                        reason
                    );
                    report.publish_failed += 1;
                }
                Announced::Unmappable(e) => {
                    tracing::warn!(origin = name, "Skipping listing {}: {}", record.identifier, e);
                    counter!("mirror_mapping_errors_total", "origin" => name.to_string())
                        .increment(1);
                    report.mapping_failed += 1;
                }
            }
        }

        // Sweeping
        *phase = CyclePhase::Sweeping;
        let swept = match self.commit(writes).await {
            Ok(swept) => swept,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        report.swept = swept.len();

        counter!("mirror_listings_kept_alive_total", "origin" => name.to_string())
            .increment(report.kept_alive as u64);
        counter!("mirror_listings_swept_total", "origin" => name.to_string())
            .increment(report.swept as u64);
        match self.store.count(name) {
            Ok(live) => {
                gauge!("mirror_live_listings", "origin" => name.to_string()).set(live as f64)
            }
            Err(e) => tracing::debug!(origin = name, "Could not count live listings: {}", e),
        }

        // Cancellations are best-effort; the sweep is already durable
        for row in &swept {
            if seen.contains(row.identifier.as_str()) {
                // Still upstream, only its re-publish failed
                continue;
            }
            if self.cancel(origin, &mut session, row, now).await {
                report.canceled += 1;
            }
        }

        session.close().await;
        *phase = CyclePhase::Done;

        Ok(report)
    }

    /// Announce a swept listing as canceled. Returns whether it reached a relay.
    async fn cancel(
        &self,
        origin: &Origin,
        session: &mut LazySession<'_>,
        row: &LivenessRow,
        now: u64,
    ) -> bool {
        if self.config.cancellation == CancellationPolicy::Omit {
            return false;
        }

        let Some(record) = &row.record else {
            tracing::debug!(
                origin = %origin.name,
                "No stored record for swept listing {}, not announcing cancellation",
                row.identifier
            );
            return false;
        };

        // Must supersede the pending announcement at the relays
        let created_at = now.max(row.first_seen + 1);

        let (outcome, canceled) =
            match announce(origin, session, record, OrderStatus::Canceled, created_at).await {
                Announced::Published => ("accepted", true),
                Announced::Failed(reason) => {
                    tracing::warn!(
                        origin = %origin.name,
                        "Cancellation of {} not published: {}",
                        row.identifier,
                        reason
                    );
                    ("failed", false)
                }
                Announced::Unmappable(e) => {
                    tracing::warn!(
                        origin = %origin.name,
                        "Cancellation of {} not mappable: {}",
                        row.identifier,
                        e
                    );
                    ("unmappable", false)
                }
            };

        counter!("mirror_cancellations_total", "origin" => origin.name.clone(), "outcome" => outcome)
            .increment(1);
        canceled
    }
}

/// Map, sign and publish every announcement of one record.
async fn announce(
    origin: &Origin,
    session: &mut LazySession<'_>,
    record: &ListingRecord,
    status: OrderStatus,
    created_at: u64,
) -> Announced {
    let events = match sign_all(origin, record, status, created_at) {
        Ok(events) => events,
        Err(e) => return Announced::Unmappable(e),
    };

    let mut published = false;
    let mut last_failure = String::new();

    for event in &events {
        let outcome = session.publish(event).await;
        counter!(
            "mirror_events_published_total",
            "origin" => origin.name.clone(),
            "outcome" => outcome.label()
        )
        .increment(1);

        match outcome {
            PublishOutcome::Accepted | PublishOutcome::Duplicate => published = true,
            PublishOutcome::Failed(reason) => last_failure = reason,
        }
    }

    if published {
        Announced::Published
    } else {
        Announced::Failed(last_failure)
    }
}

fn sign_all(
    origin: &Origin,
    record: &ListingRecord,
    status: OrderStatus,
    created_at: u64,
) -> bazaar_core::Result<Vec<Event>> {
    origin
        .mapper
        .map(record, status, created_at)?
        .iter()
        .map(|announcement| announcement.sign(&origin.keys))
        .collect()
}

enum SessionState {
    Unopened,
    Open(Box<dyn Publisher>),
    Unavailable(String),
}

/// A publisher session opened on first use, at most once per cycle.
///
/// If opening fails every publish of the cycle reports `Failed`; the cycle
/// itself carries on so keep-alives and the sweep still commit.
struct LazySession<'a> {
    transport: &'a dyn Transport,
    keys: &'a Keys,
    origin: &'a str,
    state: SessionState,
}

impl<'a> LazySession<'a> {
    fn new(transport: &'a dyn Transport, keys: &'a Keys, origin: &'a str) -> Self {
        Self {
            transport,
            keys,
            origin,
            state: SessionState::Unopened,
        }
    }

    async fn publish(&mut self, event: &Event) -> PublishOutcome {
        if matches!(self.state, SessionState::Unopened) {
            self.state = match self.transport.open(self.keys).await {
                Ok(publisher) => SessionState::Open(publisher),
                Err(e) => {
                    tracing::error!(origin = self.origin, "Could not open publisher: {}", e);
                    SessionState::Unavailable(e.to_string())
                }
            };
        }

        match &self.state {
            SessionState::Open(publisher) => publisher.publish(event).await,
            SessionState::Unavailable(reason) => PublishOutcome::Failed(reason.clone()),
            SessionState::Unopened => PublishOutcome::Failed("session not open".to_string()),
        }
    }

    async fn close(&mut self) {
        if let SessionState::Open(publisher) = &self.state {
            publisher.close().await;
        }
        self.state = SessionState::Unopened;
    }
}
