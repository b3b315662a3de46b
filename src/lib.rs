//! Creo Stats: a live view of container resource usage.
//!
//! The library streams per-container stats from the Docker daemon, turns the raw
//! counters into display values and renders them as a periodically refreshed table.
//! Workloads are either named up front or discovered through lifecycle events.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod format;
pub mod monitor;
pub mod render;
pub mod runtime;
pub mod stats;
pub mod workload;

#[cfg(test)]
mod testutil;

pub use config::{ConfigFile, StatsOptions};
pub use error::{Error, Result};

/// Runs a stats session against the daemon at `host`, writing to stdout.
///
/// The output format falls back to the configuration file when `options` does not
/// name one.
///
/// # Errors
///
/// Returns an error if the daemon address is unsupported, the daemon cannot be reached,
/// the format is invalid, or the session fails (see [`engine::run_stats`]).
pub async fn run(host: &str, mut options: StatsOptions, cancel: CancellationToken) -> Result<()> {
    options.resolve_format(&ConfigFile::load());
    let client = Arc::new(runtime::docker::DockerClient::new(host)?);
    engine::run_stats(client, &options, std::io::stdout(), cancel).await
}
