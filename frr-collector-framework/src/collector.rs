//! Collector capabilities, descriptors and the startup-time catalog.
//!
//! A protocol collector is one concrete type implementing several small
//! capability traits:
//!
//! - [`Metadata`]: name, help text and default enablement
//! - [`Emitter`]: turns shell output into [`MetricSample`]s
//! - [`FailureObserver`] (optional): running failure counters
//!
//! [`Collector`] bundles them for dynamic dispatch.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use frr_exporter_common::MetricSample;
use parking_lot::Mutex;

use crate::error::{CatalogError, CollectError};
use crate::runner::CommandRunner;

/// Immutable description of a collector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Identifier, also used for the command-line switch and the `collector` label.
    pub name: String,
    /// One-line description.
    pub help: String,
    /// Whether the collector runs unless disabled on the command line.
    pub enabled_by_default: bool,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, help: impl Into<String>, enabled_by_default: bool) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            enabled_by_default,
        }
    }

    /// "enabled" or "disabled", describing the default state.
    pub fn default_state(&self) -> &'static str {
        if self.enabled_by_default {
            "enabled"
        } else {
            "disabled"
        }
    }
}

/// Self-description of a collector.
pub trait Metadata: Send + Sync {
    fn name(&self) -> &str;

    fn help(&self) -> &str;

    fn enabled_by_default(&self) -> bool;

    fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.name(), self.help(), self.enabled_by_default())
    }
}

/// Produces metric samples from the management shell.
///
/// Any command or parse failure must come back as an `Err`, never as a panic.
/// Implementations must not keep mutable state between calls and must only
/// block inside `runner` calls, which are bounded by the runner's timeout.
/// On failure no samples are returned at all.
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn collect(&self, runner: &dyn CommandRunner) -> Result<Vec<MetricSample>, CollectError>;
}

/// Running failure counters, independent of any single scrape.
pub trait FailureObserver: Send + Sync {
    /// Record one failed scrape.
    fn record_failure(&self, error: &CollectError);

    /// Failed scrapes since process start.
    fn failures_total(&self) -> u64;

    /// Message of the most recent failure.
    fn last_failure(&self) -> Option<String>;
}

/// A protocol collector: [`Metadata`] plus [`Emitter`], optionally exposing a
/// [`FailureObserver`].
pub trait Collector: Metadata + Emitter {
    fn failure_observer(&self) -> Option<&dyn FailureObserver> {
        None
    }
}

/// Shared collector handle.
pub type SharedCollector = Arc<dyn Collector>;

/// Thread-safe [`FailureObserver`] implementation collectors can embed.
#[derive(Debug, Default)]
pub struct FailureCounter {
    total: AtomicU64,
    last: Mutex<Option<String>>,
}

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FailureObserver for FailureCounter {
    fn record_failure(&self, error: &CollectError) {
        self.total.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = Some(error.to_string());
    }

    fn failures_total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn last_failure(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

/// The registered collectors, in registration order.
///
/// Built once at startup and never mutated afterwards. Registration order is
/// the order collectors are evaluated in every scrape.
#[derive(Clone, Default)]
pub struct CollectorCatalog {
    collectors: Vec<SharedCollector>,
}

impl CollectorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector, rejecting duplicate or flag-unsafe names.
    pub fn register(&mut self, collector: SharedCollector) -> Result<(), CatalogError> {
        let name = collector.name();
        if !is_valid_name(name) {
            return Err(CatalogError::InvalidName(name.to_string()));
        }
        if self.collectors.iter().any(|c| c.name() == name) {
            return Err(CatalogError::Duplicate(name.to_string()));
        }
        self.collectors.push(collector);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, collector: SharedCollector) -> Result<Self, CatalogError> {
        self.register(collector)?;
        Ok(self)
    }

    /// Descriptors of every registered collector, in registration order.
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.collectors.iter().map(|c| c.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Snapshot of the collectors switched on in `enablement`.
    pub fn enabled(&self, enablement: &Enablement) -> EnabledCollectors {
        let collectors = self
            .collectors
            .iter()
            .filter(|c| enablement.is_enabled(c.name()))
            .cloned()
            .collect::<Vec<_>>();
        EnabledCollectors(collectors.into())
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Per-process enable/disable decision for each collector, set once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enablement {
    enabled: HashSet<String>,
}

impl Enablement {
    /// Every collector at its declared default.
    pub fn defaults(descriptors: &[Descriptor]) -> Self {
        descriptors
            .iter()
            .filter(|d| d.enabled_by_default)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        let name = name.into();
        if enabled {
            self.enabled.insert(name);
        } else {
            self.enabled.remove(&name);
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }
}

impl<S: Into<String>> FromIterator<S> for Enablement {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Read-only snapshot of the enabled collectors, cheap to clone into each scrape.
#[derive(Clone, Default)]
pub struct EnabledCollectors(Arc<[SharedCollector]>);

impl EnabledCollectors {
    pub fn iter(&self) -> impl Iterator<Item = &SharedCollector> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for EnabledCollectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
