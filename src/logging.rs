//! Logging setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is left
//! to the embedding service. [`init_logging`] is a convenience for binaries
//! and tests.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::ConfigError;

/// Variable that overrides the filter passed to [`init_logging`].
pub const LOG_ENV: &str = "RUST_LOG";

/// Installs a global fmt subscriber.
///
/// `default_filter` uses `EnvFilter` directive syntax (e.g.
/// `"info,u_timetable::scheduler=debug"`) and applies only when `RUST_LOG`
/// is unset. Returns `Ok(false)` if a global subscriber was already
/// installed.
///
/// # Errors
/// [`ConfigError::InvalidSettings`] if the directives do not parse.
pub fn init_logging(default_filter: &str) -> Result<bool, ConfigError> {
    let filter = build_filter(default_filter)?;
    let installed = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    Ok(installed)
}

fn build_filter(default_filter: &str) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(default_filter)
        .map_err(|e| ConfigError::InvalidSettings(format!("invalid log filter '{default_filter}': {e}")))
}
