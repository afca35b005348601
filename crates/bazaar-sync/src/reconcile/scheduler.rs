//! Periodic per-origin scheduling.
//!
//! Every origin gets its own task running cycles back to back, separated by
//! the poll interval. A slow or failing origin never delays the others, and
//! an origin never runs two cycles at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::Reconciler;
use crate::origin::{Origin, OriginRegistry};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
        }
    }
}

/// Runs every registered origin until stopped.
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    registry: OriginRegistry,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        reconciler: Arc<Reconciler>,
        registry: OriginRegistry,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            reconciler,
            registry,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared flag; storing `false` stops the scheduler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run until stopped. Returns once every origin task has finished its
    /// current cycle.
    pub async fn run(&self) {
        tracing::info!(
            "Starting scheduler for {} origins: {} (interval: {}s)",
            self.registry.len(),
            self.registry.names().join(", "),
            self.config.poll_interval.as_secs()
        );

        let handles: Vec<_> = self
            .registry
            .iter()
            .cloned()
            .map(|origin| {
                let reconciler = self.reconciler.clone();
                let running = self.running.clone();
                let interval = self.config.poll_interval;
                let name = origin.name.clone();
                (
                    name,
                    tokio::spawn(run_origin(reconciler, origin, interval, running)),
                )
            })
            .collect();

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(origin = %name, "Origin task ended abnormally: {}", e);
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

async fn run_origin(
    reconciler: Arc<Reconciler>,
    origin: Origin,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        // Failures are logged and counted by the reconciler
        let _ = reconciler.run_cycle(&origin).await;

        let next = chrono::Utc::now()
            + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
        tracing::debug!(
            origin = %origin.name,
            "Next cycle at {}",
            next.format("%Y-%m-%d %H:%M:%S UTC")
        );

        // Wait for the next interval (or until stopped)
        let start = Instant::now();
        while running.load(Ordering::SeqCst) {
            let elapsed = start.elapsed();
            if elapsed >= interval {
                break;
            }
            tokio::time::sleep((interval - elapsed).min(Duration::from_secs(1))).await;
        }
    }

    tracing::debug!(origin = %origin.name, "Origin task stopped");
}
