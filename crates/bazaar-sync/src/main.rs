//! Bazaar listing mirror daemon.
//!
//! Polls every enabled marketplace on a fixed interval and mirrors its open
//! offers to the configured Nostr relays.
//!
//! # Usage
//!
//! ```bash
//! # Run with default settings (all origins that have a key)
//! HODLHODL_NOSTR_NSEC=nsec1... PEACH_NOSTR_NSEC=nsec1... bazaar-sync
//!
//! # Only Peach, custom relays, no cancellation events
//! bazaar-sync \
//!     --origins peach \
//!     --relays wss://relay.example.com,wss://nos.lol \
//!     --cancellation omit
//! ```
//!
//! # Signing Keys
//!
//! Each origin signs with its own key, read from `<ORIGIN>_NOSTR_NSEC`
//! (`nsec` bech32 or hex). An origin without a key is skipped.
//!
//! # Graceful Shutdown
//!
//! SIGINT (Ctrl+C) and SIGTERM stop the scheduler; each origin finishes its
//! current cycle before the process exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bazaar_core::metrics::{init_metrics, start_metrics_server};
use bazaar_sync::{
    BUILTIN_ORIGINS, CancellationPolicy, HttpConfig, LivenessStore, Origin, OriginRegistry,
    ReconcileConfig, Reconciler, RelayTransport, RelayTransportConfig, Scheduler,
    SchedulerConfig, normalize_endpoints,
};
use clap::Parser;
use nostr_sdk::Keys;
use tracing_subscriber::EnvFilter;

/// Bazaar listing mirror daemon.
#[derive(Parser, Debug)]
#[command(name = "bazaar-sync")]
#[command(about = "Mirrors marketplace listings to Nostr relays")]
#[command(version)]
struct Args {
    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    /// SQLite liveness database path
    #[arg(long, env = "BAZAAR_DB_PATH", default_value = "./data/nostr_sync.db")]
    db_path: PathBuf,

    /// Relay URLs (comma-separated)
    #[arg(
        long,
        env = "BAZAAR_RELAYS",
        value_delimiter = ',',
        default_value = "ws://localhost,wss://nostrvista.aaroniumii.com,wss://nostr.satstralia.com,wss://freelay.sovbit.host"
    )]
    relays: Vec<String>,

    /// Origins to mirror (comma-separated, default all)
    #[arg(long, env = "BAZAAR_ORIGINS", value_delimiter = ',')]
    origins: Option<Vec<String>>,

    /// Seconds between cycles of one origin
    #[arg(long, env = "BAZAAR_POLL_INTERVAL_SECS", default_value = "300")]
    poll_interval_secs: u64,

    /// Announcement lifetime at the relays, in seconds
    #[arg(long, env = "BAZAAR_EXPIRATION_SECS", default_value = "3600")]
    expiration_secs: u64,

    /// Seconds a publish keeps a listing live (defaults to the expiration)
    #[arg(long, env = "BAZAAR_FRESHNESS_SECS")]
    freshness_secs: Option<u64>,

    /// Seconds to wait for relay connections before publishing
    #[arg(long, env = "BAZAAR_CONNECT_WAIT_SECS", default_value = "2")]
    connect_wait_secs: u64,

    /// What to announce for listings that vanished upstream
    #[arg(long, env = "BAZAAR_CANCELLATION", value_enum, default_value = "republish")]
    cancellation: CancellationPolicy,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, env = "BAZAAR_METRICS_PORT", default_value = "9090")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required when both ring and aws-lc-rs are present)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();

    // Load .env file if it exists, then re-read arguments so env fallbacks see it
    let args = if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv))?;
        eprintln!("Loaded environment from {}", args.dotenv);
        Args::parse()
    } else {
        args
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("bazaar_sync=debug".parse()?),
        )
        .init();

    tracing::info!("Bazaar listing mirror starting...");

    if args.freshness_secs.is_some_and(|f| f > args.expiration_secs) {
        tracing::warn!(
            "Freshness window exceeds expiration; listings may lapse at relays before re-announcement"
        );
    }

    // Initialize metrics
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle)
            .await
            .context("Failed to start metrics server")?;
    }

    let relays = normalize_endpoints(&args.relays).context("Invalid relay configuration")?;
    let expiration = Duration::from_secs(args.expiration_secs);
    let registry = build_registry(&args, expiration)?;

    tracing::info!("Configuration:");
    tracing::info!("  Database: {}", args.db_path.display());
    tracing::info!("  Relays: {}", relays.join(", "));
    tracing::info!("  Origins: {}", registry.names().join(", "));
    tracing::info!("  Poll interval: {}s", args.poll_interval_secs);
    tracing::info!("  Expiration: {}s", args.expiration_secs);
    tracing::info!("  Cancellation: {:?}", args.cancellation);

    let store = Arc::new(
        LivenessStore::open(&args.db_path)
            .with_context(|| format!("Failed to open {}", args.db_path.display()))?,
    );

    let transport = Arc::new(RelayTransport::new(RelayTransportConfig {
        relays,
        connect_wait: Duration::from_secs(args.connect_wait_secs),
    }));

    let reconciler = Arc::new(Reconciler::new(
        store,
        transport,
        ReconcileConfig {
            freshness: Duration::from_secs(args.freshness_secs.unwrap_or(args.expiration_secs)),
            cancellation: args.cancellation,
        },
    ));

    let scheduler = Scheduler::new(
        reconciler,
        registry,
        SchedulerConfig {
            poll_interval: Duration::from_secs(args.poll_interval_secs),
        },
    );

    // Set up graceful shutdown
    let running = scheduler.running_flag();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping after current cycles...");
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    scheduler.run().await;

    tracing::info!("Bazaar listing mirror stopped");
    Ok(())
}

/// Register every selected origin that has a signing key.
fn build_registry(args: &Args, expiration: Duration) -> Result<OriginRegistry> {
    let selected: Vec<String> = match &args.origins {
        Some(origins) => origins.iter().map(|o| o.trim().to_lowercase()).collect(),
        None => BUILTIN_ORIGINS.iter().map(|o| o.to_string()).collect(),
    };

    let http = HttpConfig::default();
    let mut registry = OriginRegistry::new();

    for name in &selected {
        let key_var = format!("{}_NOSTR_NSEC", name.to_uppercase());
        let Ok(secret) = std::env::var(&key_var) else {
            tracing::warn!("{} not set, origin '{}' disabled", key_var, name);
            continue;
        };

        let keys = Keys::parse(secret.trim())
            .with_context(|| format!("{} is not a valid secret key", key_var))?;
        tracing::info!("Origin '{}' publishes as {}", name, keys.public_key().to_hex());

        registry.register(Origin::builtin(name, keys, &http, expiration)?)?;
    }

    if registry.is_empty() {
        bail!("No origins enabled; set at least one <ORIGIN>_NOSTR_NSEC");
    }

    Ok(registry)
}
