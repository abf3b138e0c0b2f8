/// Fixture Sync — periodic batch reconciler
///
/// What it does:
///   1. Reads the competition index and every fixture's round 1 (discover)
///   2. Walks the rounds of every fixture the home club plays in (games)
///   3. Merges what it finds into the store without erasing known scores
///
/// Run:
///   cargo run --bin fixture-sync -- [discover|games|full]

use anyhow::{Context, Result};
use dotenv::dotenv;
use fetcher::{cancel_pair, Fetcher, HostLimiter, HttpTransport, RetryPolicy};
use fixture_sync::{Config, Orchestrator, RunMode, SqliteStore};
use logger::EventLogger;
use std::env;
use std::fs::File;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let mode: RunMode = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => RunMode::Full,
    };
    let cfg = Config::from_env().context("load configuration")?;

    // Single instance lock
    let lock_file_path = env::temp_dir().join("fixture_sync.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another fixture-sync run is already in progress! Exiting.");
            return Ok(());
        }
    };

    info!("Store: {}", cfg.db_path.display());
    info!("Logs: {}/", cfg.log_dir.display());
    info!(
        "Max rounds {}, {} workers, {}ms between requests per host",
        cfg.max_rounds,
        cfg.concurrency,
        cfg.politeness_delay.as_millis()
    );

    let (cancel, signal) = cancel_pair();
    if let Some(deadline) = cfg.deadline {
        cancel.cancel_after(deadline);
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C: no new fetches, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let transport = HttpTransport::new(cfg.request_timeout).context("build http client")?;
    let limiter = Arc::new(HostLimiter::new(cfg.politeness_delay));
    let policy = RetryPolicy { max_retries: cfg.max_retries, delay: cfg.retry_delay };
    let fetcher = Fetcher::new(transport, limiter, policy, signal);
    let store = Arc::new(SqliteStore::open(&cfg.db_path).context("open store")?);
    let log_dir = cfg.log_dir.clone();
    let events = EventLogger::new(&log_dir);

    let started = Instant::now();
    let orchestrator = Orchestrator::new(cfg, fetcher, store).with_events(events);
    let result = orchestrator.run(mode).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let summary = result?;
    let event_log = EventLogger::new(&log_dir);
    if let Err(e) = event_log.log(&summary.to_event(mode, elapsed_ms)) {
        warn!("Failed to write run summary event: {}", e);
    }

    info!("=== Run complete in {:.1}s ===", elapsed_ms as f64 / 1000.0);
    info!("Competitions scanned: {}", summary.competitions_scanned);
    info!("Teams tracked: {}", summary.teams_tracked);
    info!(
        "Games: {} created, {} updated, {} unchanged",
        summary.games.created, summary.games.updated, summary.games.noop
    );
    info!(
        "Teams: {} created, {} updated | Clubs: {} created | Competitions: {} created",
        summary.teams.created, summary.teams.updated, summary.clubs.created, summary.competitions.created
    );
    if summary.fetch_failures + summary.collisions + summary.store_failures > 0 {
        warn!(
            "Failures: {} fetch, {} identity collisions, {} store",
            summary.fetch_failures, summary.collisions, summary.store_failures
        );
    }
    if summary.cancelled {
        warn!("Run was cancelled before all rounds were polled");
    }
    Ok(())
}
