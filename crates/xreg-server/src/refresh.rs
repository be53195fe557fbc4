//! Periodic catalogue refresh.
//!
//! On start, the index is built synchronously when none exists; after
//! that a fixed-interval timer rebuilds it unconditionally. A failed
//! refresh logs, leaves the previous database in place, and is retried
//! on the next tick. Client disconnects never cancel this task.

use std::sync::Arc;
use std::time::Duration;
use xreg_maven::{IndexBuildOptions, MavenAdapter, build_index};

/// Maven Central's catalogue moves slowly; one rebuild a week.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
    pub build: IndexBuildOptions,
    /// Rebuild at startup even when a database is already present.
    pub initial_force: bool,
}

impl RefreshConfig {
    pub fn new(build: IndexBuildOptions) -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            build,
            initial_force: false,
        }
    }
}

/// One initial load if the database is missing, then the timer loop.
/// Runs forever; spawn it as a background task.
pub async fn run(adapter: Arc<MavenAdapter>, config: RefreshConfig) {
    if config.initial_force || !config.build.output.exists() {
        tracing::info!("building catalogue index");
        let mut options = config.build.clone();
        options.force = config.initial_force;
        refresh_once(&adapter, &options).await;
    } else if let Err(err) = adapter.attach_store(&config.build.output) {
        tracing::warn!(error = %err, "existing index database could not be opened");
    }

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; the database was just handled.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let mut options = config.build.clone();
        options.force = true;
        refresh_once(&adapter, &options).await;
    }
}

async fn refresh_once(adapter: &MavenAdapter, options: &IndexBuildOptions) {
    match build_index(options).await {
        Ok(report) => {
            if !report.skipped {
                tracing::info!(
                    packages = report.packages_inserted,
                    "catalogue refresh complete"
                );
            }
            if let Err(err) = adapter.attach_store(&options.output) {
                tracing::warn!(error = %err, "rebuilt index could not be opened");
            }
        }
        Err(err) => {
            // Last-good state stays live; the next tick retries.
            tracing::warn!(error = %err, "catalogue refresh failed");
        }
    }
}
