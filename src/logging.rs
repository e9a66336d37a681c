//! Diagnostics setup.
//!
//! The TUI owns the terminal, so log output goes to a file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::settings::LogSettings;

/// Build the filter from `RUST_LOG` if set, else from the configured level.
pub fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    let directives = rust_log.filter(|s| !s.trim().is_empty()).unwrap_or(level);
    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter '{}'", directives))
}

/// Install the global subscriber writing to the configured file.
pub fn init(settings: &LogSettings) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)
        .with_context(|| format!("failed to open log file {}", settings.file.display()))?;

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&settings.level, rust_log.as_deref())?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    Ok(())
}
