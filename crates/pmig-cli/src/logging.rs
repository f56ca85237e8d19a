//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout carries only the summary. `RUST_LOG`, when
//! set, replaces the configured level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `RUST_LOG`, falling back to the configured level
fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// # Errors
/// - if a global subscriber is already installed
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(filter(config));
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}
