//! Prometheus exporter for FRRouting.
//!
//! Every request to the telemetry path triggers one scrape: each enabled
//! protocol collector queries the routing daemon through `vtysh`, and the
//! results are encoded from a registry that lives only as long as the request.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────┐
//! │ HTTP server │────>│  Exporter   │────>│ Collectors  │────>│ vtysh   │
//! │ (/metrics)  │<────│  (scrape)   │<────│ (bgp, ...)  │<────│ (FRR)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! frr-exporter --web.listen-address :9342 --frr.vtysh.timeout 10s --collector.bgp6
//! ```
//!
//! See [`config::ExporterArgs`] for all flags.

pub mod config;
pub mod exporter;
pub mod http;
pub mod process;
pub mod registry;

pub use config::{ConfigError, ExporterArgs, ExporterConfig, VtyshConfig};
pub use exporter::{BaselineMetrics, Exporter, Scrape, ScrapeOutcome};
pub use http::{AppState, HttpServer, create_router};
pub use process::ProcessMetrics;
pub use registry::{EncodeError, RegistryError, ScrapeRegistry};
