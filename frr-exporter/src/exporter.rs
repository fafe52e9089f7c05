//! Scrape orchestration.
//!
//! An [`Exporter`] runs every enabled collector once, in registration order,
//! and assembles the results into a fresh [`ScrapeRegistry`]:
//!
//! ```text
//! for each enabled collector:
//!     collect(runner) bounded by the timeout
//!         ok  -> merge samples, collector_up = 1
//!         err -> drop samples,  collector_up = 0, log + count failure
//!     scrape_duration_seconds
//! scrape_errors_total (from failure observers)
//! baseline metrics (build info, scrapes served, process_*)
//! ```
//!
//! A failing collector never affects the others, and nothing carries over
//! from one scrape to the next apart from the baseline counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use frr_collector_framework::{
    CollectError, Collector, CommandRunner, Emitter, EnabledCollectors, Metadata, MetricSample,
};
use prometheus_client::metrics::counter::Counter;
use tracing::{debug, warn};

use crate::process::ProcessMetrics;
use crate::registry::{RegistryError, ScrapeRegistry};

/// Slack on top of the collector deadline so a runner hitting its own
/// timeout can kill and reap the shell before the collector is abandoned.
pub const DEADLINE_GRACE: Duration = Duration::from_millis(500);

/// Result of one collector in one scrape.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub collector: String,
    pub duration: Duration,
    /// `None` on success.
    pub error: Option<CollectError>,
}

impl ScrapeOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything one scrape produced.
#[derive(Debug)]
pub struct Scrape {
    pub registry: ScrapeRegistry,
    /// One entry per enabled collector, in evaluation order.
    pub outcomes: Vec<ScrapeOutcome>,
}

/// Process-wide metrics merged into every scrape.
#[derive(Debug)]
pub struct BaselineMetrics {
    version: String,
    scrapes: Counter,
    process: ProcessMetrics,
}

impl BaselineMetrics {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            scrapes: Counter::default(),
            process: ProcessMetrics::new(),
        }
    }

    /// Scrapes started since process start.
    pub fn scrapes_total(&self) -> u64 {
        self.scrapes.get()
    }

    fn register(&self, registry: &mut ScrapeRegistry) -> Result<(), RegistryError> {
        registry.add_info(
            "exporter_build",
            "Version of the exporter.",
            vec![("version".to_string(), self.version.clone())],
        )?;
        registry.add_shared_counter("scrapes", "Scrapes served since the exporter started.", &self.scrapes)?;
        for sample in self.process.samples() {
            registry.add_unprefixed(sample)?;
        }
        Ok(())
    }
}

/// Drives the enabled collectors for one scrape.
pub struct Exporter {
    collectors: EnabledCollectors,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    baseline: Arc<BaselineMetrics>,
}

impl Exporter {
    /// `timeout` bounds each collector as a whole, plus [`DEADLINE_GRACE`],
    /// on top of the runner's own per-command timeout.
    pub fn new(
        collectors: EnabledCollectors,
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
        baseline: Arc<BaselineMetrics>,
    ) -> Self {
        Self {
            collectors,
            runner,
            timeout,
            baseline,
        }
    }

    /// Run one scrape. Never fails; collector failures become metrics.
    pub async fn scrape(&self) -> Scrape {
        self.baseline.scrapes.inc();

        let mut registry = ScrapeRegistry::new();
        let mut outcomes = Vec::with_capacity(self.collectors.len());

        for collector in self.collectors.iter() {
            let outcome = self.run(collector.as_ref(), &mut registry).await;
            outcomes.push(outcome);
        }

        for collector in self.collectors.iter() {
            if let Some(observer) = collector.failure_observer() {
                let sample = MetricSample::counter(
                    "scrape_errors",
                    "Failed scrapes of a collector since the exporter started.",
                    observer.failures_total() as f64,
                )
                .with_label("collector", collector.name());
                merge(&mut registry, "exporter", [sample]);
            }
        }

        if let Err(e) = self.baseline.register(&mut registry) {
            warn!(error = %e, "Dropping baseline metrics");
        }

        Scrape { registry, outcomes }
    }

    async fn run(&self, collector: &dyn Collector, registry: &mut ScrapeRegistry) -> ScrapeOutcome {
        let name = collector.name();
        let start = Instant::now();

        let deadline = self.timeout + DEADLINE_GRACE;
        let result = tokio::time::timeout(deadline, collector.collect(self.runner.as_ref()))
            .await
            .unwrap_or_else(|_| {
                Err(CollectError::Deadline {
                    collector: name.to_string(),
                    timeout: self.timeout,
                })
            });
        let duration = start.elapsed();

        merge(
            registry,
            "exporter",
            [
                MetricSample::gauge(
                    "collector_up",
                    "Whether the collector's last scrape was successful (1 = success, 0 = failure).",
                    if result.is_ok() { 1.0 } else { 0.0 },
                )
                .with_label("collector", name),
                MetricSample::gauge(
                    "scrape_duration_seconds",
                    "Time the collector's scrape took.",
                    duration.as_secs_f64(),
                )
                .with_label("collector", name),
            ],
        );

        let error = match result {
            Ok(samples) => {
                debug!(
                    collector = name,
                    samples = samples.len(),
                    duration_ms = duration.as_millis() as u64,
                    "Collector succeeded"
                );
                merge(registry, name, samples);
                None
            }
            Err(e) => {
                warn!(
                    collector = name,
                    kind = e.kind(),
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "Collector failed"
                );
                if let Some(observer) = collector.failure_observer() {
                    observer.record_failure(&e);
                }
                Some(e)
            }
        };

        ScrapeOutcome {
            collector: name.to_string(),
            duration,
            error,
        }
    }
}

fn merge(registry: &mut ScrapeRegistry, source: &str, samples: impl IntoIterator<Item = MetricSample>) {
    for e in registry.extend(samples) {
        warn!(source, error = %e, "Dropping metric sample");
    }
}
