use thiserror::Error;

/// Common error type for the FRR exporter crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid log level '{level}': {reason}")]
    LogLevel { level: String, reason: String },
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
