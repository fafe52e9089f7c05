//! FRR Exporter Common Library
//!
//! Shared types and utilities for the FRR exporter crates:
//!
//! - [`telemetry`] - Metric sample data model (`MetricSample`, `MetricKind`) and name sanitization
//! - [`config`] - Logging configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{DEFAULT_LOG_LEVEL, LOG_LEVELS, LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use telemetry::{MetricKind, MetricSample, sanitize_label_name, sanitize_metric_name};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// The level comes from the configuration only; `RUST_LOG` is not consulted.
///
/// # Example
///
/// ```ignore
/// use frr_exporter_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig::new("debug", LogFormat::Json);
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if !config.has_valid_level() {
        return Err(Error::LogLevel {
            level: config.level.clone(),
            reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
        });
    }

    let filter = EnvFilter::try_new(config.level.to_ascii_lowercase()).map_err(|e| {
        Error::LogLevel {
            level: config.level.clone(),
            reason: e.to_string(),
        }
    })?;

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
