//! Tracing setup: a daily-rolling file under the logs directory, plus
//! compact stderr output for the interactive binary.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::config::RelayConfig;

const LOG_FILE_PREFIX: &str = "relay";

/// The configured level globally, debug for the workspace's own crates.
fn default_filter(level: &str) -> String {
    format!("{level},relay_app=debug,relay_core=debug,relay_ai=debug")
}

/// `RUST_LOG` wins over the configured filter when set.
fn env_or(filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
}

fn rolling_writer(logs_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create logs dir {}", logs_dir.display()))?;
    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

fn file_layer(writer: NonBlocking) -> impl Layer<Registry> + Send + Sync {
    fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
}

/// Logs to `~/.relay/logs` and stderr at `level`.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logging(level: &str) -> Result<WorkerGuard> {
    let (writer, guard) = rolling_writer(&RelayConfig::logs_dir()?)?;
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(file_layer(writer).and_then(console).with_filter(env_or(&default_filter(level))))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// File-only logging into `logs_dir` with an explicit filter directive.
pub fn init_logging_to_dir(logs_dir: &Path, filter: &str) -> Result<WorkerGuard> {
    let (writer, guard) = rolling_writer(logs_dir)?;

    tracing_subscriber::registry()
        .with(file_layer(writer).with_filter(env_or(filter)))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
