//! FRR Collector Framework
//!
//! Common abstractions for collectors that read routing-daemon state through
//! the management shell.
//!
//! # Overview
//!
//! This framework provides:
//! - [`CommandRunner`] and its `vtysh`-backed implementation [`VtyshRunner`]
//! - The collector capability traits [`Metadata`], [`Emitter`] and [`FailureObserver`],
//!   bundled as [`Collector`]
//! - [`CollectorCatalog`], the immutable registry of collectors built at startup
//! - [`CollectorSwitches`] for deriving one command-line switch per collector
//!
//! # Example
//!
//! ```ignore
//! use frr_collector_framework::{CollectorCatalog, CollectorSwitches};
//!
//! let catalog = CollectorCatalog::new().with(Arc::new(MyCollector::new()))?;
//! let switches = CollectorSwitches::new(catalog.descriptors());
//! let matches = switches.augment(clap::Command::new("exporter")).get_matches();
//! let enabled = catalog.enabled(&switches.resolve(&matches));
//! ```

mod args;
mod collector;
mod error;
mod runner;

pub use args::{COLLECTOR_FLAG_PREFIX, CollectorSwitches, flag_name, help_text};
pub use collector::{
    Collector, CollectorCatalog, Descriptor, EnabledCollectors, Emitter, Enablement,
    FailureCounter, FailureObserver, Metadata, SharedCollector,
};
pub use error::{CatalogError, CollectError, CommandError, Result};
pub use runner::{CommandRunner, VtyshRunner};

// Re-export commonly used types from frr-exporter-common
pub use frr_exporter_common::{MetricKind, MetricSample};

// Collectors implement the async capability traits with this attribute.
pub use async_trait::async_trait;
