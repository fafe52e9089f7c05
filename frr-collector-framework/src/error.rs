//! Error types for the collector framework.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`CollectError`].
pub type Result<T> = std::result::Result<T, CollectError>;

/// Errors returned by a [`CommandRunner`](crate::CommandRunner).
#[derive(Error, Debug)]
pub enum CommandError {
    /// The shell did not finish within the configured timeout and was killed.
    #[error("command '{command}' timed out after {}", humantime::format_duration(*timeout))]
    Timeout { command: String, timeout: Duration },

    /// The shell binary could not be started.
    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shell exited with a non-zero status.
    #[error("command '{command}' exited with {}: {}", status_text(*status), stderr.trim())]
    Exit {
        command: String,
        /// Exit code, `None` when terminated by a signal.
        status: Option<i32>,
        stderr: String,
        stdout: String,
    },

    /// Reading the shell's output failed.
    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn status_text(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

/// Errors that make a single collector's scrape fail.
#[derive(Error, Debug)]
pub enum CollectError {
    /// Running a shell command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Shell output could not be understood.
    #[error("failed to parse output of '{command}': {message}")]
    Parse { command: String, message: String },

    /// The collector did not return within its time budget.
    #[error("collector '{collector}' did not finish within {}", humantime::format_duration(*timeout))]
    Deadline { collector: String, timeout: Duration },
}

impl CollectError {
    /// Create a parse error.
    pub fn parse(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Short failure category, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::Command(CommandError::Timeout { .. }) | CollectError::Deadline { .. } => {
                "timeout"
            }
            CollectError::Command(_) => "execution",
            CollectError::Parse { .. } => "parse",
        }
    }

    /// Whether this failure was caused by running out of time.
    pub fn is_timeout(&self) -> bool {
        self.kind() == "timeout"
    }
}

/// Errors raised while building the collector catalog at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// Two collectors registered under the same name.
    #[error("collector '{0}' registered twice")]
    Duplicate(String),

    /// The name cannot be turned into a command-line flag.
    #[error("invalid collector name '{0}': use lowercase letters, digits, '_' or '-'")]
    InvalidName(String),
}
