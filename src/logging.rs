/// Logging setup
///
/// Installs a global tracing subscriber. The filter comes from
/// `PROMPT_KEEPER_LOG`, then `RUST_LOG`, then the configured level.

use crate::config::LoggingSettings;
use crate::error::{KeeperError, Result};
use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "PROMPT_KEEPER_LOG";

fn build_env_filter(settings: &LoggingSettings) -> EnvFilter {
    let filter = env::var(LOG_ENV)
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| settings.level.clone());

    EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging to stderr
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    tracing_subscriber::registry()
        .with(build_env_filter(settings))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| KeeperError::Config(format!("failed to initialize logging: {}", e)))
}
