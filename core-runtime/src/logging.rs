//! # Logging & Tracing Infrastructure
//!
//! Configures the `tracing-subscriber` stack used by every crate in the
//! workspace. Hosts call [`init_logging`] once at startup; library code just
//! emits `tracing` events.
//!
//! Filtering follows the standard `RUST_LOG` syntax: the configured filter
//! string is used as a default and the `RUST_LOG` environment variable, when
//! set, takes precedence.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Pretty)
//!     .with_filter("debug,core_playback=trace");
//! init_logging(config).expect("failed to initialize logging");
//!
//! tracing::info!("player core started");
//! ```

use crate::error::{Error, Result};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact format for production
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive, overridden by `RUST_LOG` when present
    pub filter: String,
    /// Whether to include the event target (module path) in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            filter: "info".to_string(),
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the default filter directive (e.g. `"debug,core_playback=trace"`).
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Include or omit event targets in output.
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns [`Error::LoggingInit`] if the filter directive cannot be parsed or
/// a global subscriber has already been installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| Error::LoggingInit(format!("invalid filter directive: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let init_result = match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(config.with_target),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(config.with_target),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(config.with_target),
            )
            .try_init(),
    };

    init_result.map_err(|e| Error::LoggingInit(e.to_string()))?;

    tracing::debug!(format = ?config.format, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filter, "info");
        assert!(config.with_target);
    }

    #[test]
    fn builder_chain() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_filter("debug")
            .with_target(false);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "debug");
        assert!(!config.with_target);
    }
}
