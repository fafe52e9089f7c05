//! Command-line configuration for the exporter.
//!
//! Static flags are declared with the clap derive API in [`ExporterArgs`];
//! the per-collector switches are added at runtime by
//! [`CollectorSwitches`]. Everything is validated exactly once into an
//! immutable [`ExporterConfig`].

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Command, FromArgMatches};
use frr_collector_framework::{CollectorSwitches, Enablement};
use frr_exporter_common::{DEFAULT_LOG_LEVEL, LOG_LEVELS, LogFormat, LoggingConfig};
use thiserror::Error;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9342";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_VTYSH_PATH: &str = "/usr/bin/vtysh";
pub const DEFAULT_VTYSH_TIMEOUT: &str = "20s";

const LISTEN_ADDRESS_FLAG: &str = "--web.listen-address";
const TELEMETRY_PATH_FLAG: &str = "--web.telemetry-path";
const VTYSH_TIMEOUT_FLAG: &str = "--frr.vtysh.timeout";
const LOG_LEVEL_FLAG: &str = "--log.level";

/// Startup configuration errors. Every message names the flag and the value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for '{flag}': {reason}")]
    InvalidTimeout {
        flag: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid value '{value}' for '{flag}': expected HOST:PORT or :PORT")]
    InvalidListenAddress { flag: &'static str, value: String },

    #[error("invalid value '{value}' for '{flag}': {reason}")]
    InvalidTelemetryPath {
        flag: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("invalid value '{value}' for '{flag}': expected one of {}", LOG_LEVELS.join(", "))]
    InvalidLogLevel { flag: &'static str, value: String },
}

/// Static command-line flags.
#[derive(Debug, Clone, Args)]
pub struct ExporterArgs {
    /// Address on which to expose metrics and the landing page. ":PORT" listens
    /// on all IPv6 and IPv4 addresses, falling back to IPv4 only when IPv6 is
    /// unavailable.
    #[arg(long = "web.listen-address", value_name = "ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", value_name = "PATH", default_value = DEFAULT_TELEMETRY_PATH)]
    pub telemetry_path: String,

    /// Path of the vtysh binary.
    #[arg(long = "frr.vtysh.path", value_name = "PATH", default_value = DEFAULT_VTYSH_PATH)]
    pub vtysh_path: PathBuf,

    /// Time budget of each vtysh command and each collector (e.g. "20s", "1m 30s").
    #[arg(long = "frr.vtysh.timeout", value_name = "DURATION", default_value = DEFAULT_VTYSH_TIMEOUT)]
    pub vtysh_timeout: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log.level", value_name = "LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Log output format.
    #[arg(long = "log.format", value_name = "FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// The full command line: static flags plus one switch pair per collector.
pub fn command(switches: &CollectorSwitches) -> Command {
    let command = Command::new("frr-exporter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Prometheus exporter for FRRouting daemon state");
    switches.augment(ExporterArgs::augment_args(command))
}

/// Parse a command line into the static flags and the collector enablement.
pub fn parse_from<I, T>(
    switches: &CollectorSwitches,
    args: I,
) -> Result<(ExporterArgs, Enablement), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command(switches).try_get_matches_from(args)?;
    let parsed = ExporterArgs::from_arg_matches(&matches)?;
    Ok((parsed, switches.resolve(&matches)))
}

/// `vtysh` settings shared by the runner and the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtyshConfig {
    pub path: PathBuf,
    pub timeout: Duration,
}

/// Validated, immutable exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    pub listen: SocketAddr,
    pub telemetry_path: String,
    pub vtysh: VtyshConfig,
    pub logging: LoggingConfig,
}

impl ExporterConfig {
    /// Validate parsed flags. Fails on the first offending flag.
    pub fn from_args(args: ExporterArgs) -> Result<Self, ConfigError> {
        let timeout = parse_timeout(&args.vtysh_timeout)?;
        let listen = parse_listen_address(&args.listen_address)?;

        if let Err(reason) = check_telemetry_path(&args.telemetry_path) {
            return Err(ConfigError::InvalidTelemetryPath {
                flag: TELEMETRY_PATH_FLAG,
                value: args.telemetry_path,
                reason,
            });
        }

        let logging = LoggingConfig::new(args.log_level.to_ascii_lowercase(), args.log_format);
        if !logging.has_valid_level() {
            return Err(ConfigError::InvalidLogLevel {
                flag: LOG_LEVEL_FLAG,
                value: args.log_level,
            });
        }

        Ok(Self {
            listen,
            telemetry_path: args.telemetry_path,
            vtysh: VtyshConfig {
                path: args.vtysh_path,
                timeout,
            },
            logging,
        })
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTimeout {
        flag: VTYSH_TIMEOUT_FLAG,
        value: value.to_string(),
        reason,
    };

    let timeout = humantime::parse_duration(value.trim()).map_err(|e| invalid(e.to_string()))?;
    if timeout.is_zero() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(timeout)
}

/// The router takes the path as a route pattern, so anything it would read
/// as a parameter or wildcard is refused here instead of at bind time.
fn check_telemetry_path(path: &str) -> Result<(), &'static str> {
    if !path.starts_with('/') {
        return Err("must start with '/'");
    }
    if path == "/" {
        return Err("'/' serves the landing page");
    }
    if path.contains("//") {
        return Err("must not contain empty segments");
    }
    if path.contains([':', '*', '{', '}']) {
        return Err("must not contain ':', '*', '{' or '}'");
    }
    Ok(())
}

/// Accepts `HOST:PORT`, `[V6]:PORT` and `:PORT` (all interfaces, dual-stack).
fn parse_listen_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = match value.strip_prefix(':') {
        Some(port) => format!("[::]:{}", port),
        None => value.to_string(),
    };

    candidate
        .parse()
        .map_err(|_| ConfigError::InvalidListenAddress {
            flag: LISTEN_ADDRESS_FLAG,
            value: value.to_string(),
        })
}
