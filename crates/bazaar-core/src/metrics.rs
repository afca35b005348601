//! Prometheus metrics helpers for the bazaar mirror.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bazaar_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     metrics::counter!("mirror_cycles_total", "origin" => "peach", "result" => "ok")
//!         .increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `mirror_`
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: `origin` on everything, plus a small closed set (`result`,
//!   `outcome`) where noted

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_mirror_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_mirror_metrics();
    Some(handle)
}

/// Start the Prometheus metrics HTTP server on `0.0.0.0:<port>/metrics`.
///
/// Binds before returning so a busy port is reported to the caller; serving
/// happens on a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for every metric the mirror records.
fn register_mirror_metrics() {
    // =========================================================================
    // Cycle Metrics
    // =========================================================================

    describe_counter!(
        "mirror_cycles_total",
        "Reconciliation cycles run (labels: origin, result=ok|fetch_error|store_error|publish_error)"
    );
    describe_histogram!(
        "mirror_cycle_duration_seconds",
        "Wall time of one reconciliation cycle (label: origin)"
    );
    describe_gauge!(
        "mirror_generation",
        "Generation reached by the last committed cycle (label: origin)"
    );
    describe_gauge!(
        "mirror_live_listings",
        "Listings tracked in the liveness store after the last cycle (label: origin)"
    );

    // =========================================================================
    // Listing Metrics
    // =========================================================================

    describe_counter!(
        "mirror_listings_fetched_total",
        "Listings returned by upstream sources (label: origin)"
    );
    describe_counter!(
        "mirror_listings_kept_alive_total",
        "Listings still present upstream whose generation was bumped (label: origin)"
    );
    describe_counter!(
        "mirror_listings_swept_total",
        "Listings removed from the liveness store because they vanished upstream (label: origin)"
    );
    describe_counter!(
        "mirror_mapping_errors_total",
        "Listings skipped because they could not be mapped (label: origin)"
    );

    // =========================================================================
    // Publish Metrics
    // =========================================================================

    describe_counter!(
        "mirror_events_published_total",
        "Announcement publish attempts (labels: origin, outcome=accepted|duplicate|failed)"
    );
    describe_counter!(
        "mirror_cancellations_total",
        "Cancellation announcements for swept listings (labels: origin, outcome)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();

        // At most one should succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_register_mirror_metrics_does_not_panic() {
        ensure_metrics_init();
        register_mirror_metrics();
        register_mirror_metrics();
    }

    #[test]
    fn test_labelled_counters_do_not_panic() {
        ensure_metrics_init();
        metrics::counter!("mirror_events_published_total", "origin" => "test", "outcome" => "accepted")
            .increment(1);
        metrics::gauge!("mirror_live_listings", "origin" => "test").set(3.0);
    }
}
