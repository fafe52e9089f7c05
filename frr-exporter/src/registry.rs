//! Per-scrape metric registry and OpenMetrics encoding.
//!
//! A [`ScrapeRegistry`] is created for every scrape and dropped after the
//! response is written, so metric families never outlive the request that
//! produced them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicU64;

use frr_exporter_common::{MetricKind, MetricSample, sanitize_label_name, sanitize_metric_name};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family as MetricFamily;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;
use thiserror::Error;

/// Namespace prepended to every metric name.
pub const NAMESPACE: &str = "frr";

/// Content type of [`ScrapeRegistry::encode`] output.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

type Labels = Vec<(String, String)>;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A metric name was reused with a different type.
    #[error("metric '{name}' is already registered as {existing}, cannot add it as {requested}")]
    KindConflict {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// Two distinct families would write samples under the same name.
    #[error("family '{family}' would write '{sample}', which family '{existing}' already writes")]
    NameCollision {
        family: String,
        sample: String,
        existing: String,
    },
}

/// Writing the exposition text failed part way through.
#[derive(Debug, Error)]
#[error("failed to encode metrics after {} bytes: {source}", partial.len())]
pub struct EncodeError {
    /// Everything written before the failure.
    pub partial: String,
    #[source]
    pub source: std::fmt::Error,
}

#[derive(Debug)]
enum Family {
    Samples {
        kind: MetricKind,
        help: String,
        series: BTreeMap<Labels, f64>,
    },
    SharedCounter {
        help: String,
        counter: Counter,
    },
    Info {
        help: String,
        labels: Labels,
    },
}

impl Family {
    fn kind(&self) -> FamilyKind {
        match self {
            Family::Samples { kind, .. } => FamilyKind::Samples(*kind),
            Family::SharedCounter { .. } => FamilyKind::SharedCounter,
            Family::Info { .. } => FamilyKind::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FamilyKind {
    Samples(MetricKind),
    SharedCounter,
    Info,
}

impl FamilyKind {
    fn as_str(&self) -> &'static str {
        match self {
            FamilyKind::Samples(kind) => kind.as_str(),
            FamilyKind::SharedCounter => "process counter",
            FamilyKind::Info => "info",
        }
    }

    /// Name of the samples written for family `qualified`.
    fn sample_name(&self, qualified: &str) -> String {
        match self {
            FamilyKind::Samples(MetricKind::Gauge) => qualified.to_string(),
            FamilyKind::Samples(MetricKind::Counter) | FamilyKind::SharedCounter => {
                format!("{}_total", qualified)
            }
            FamilyKind::Info => format!("{}_info", qualified),
        }
    }
}

#[derive(Debug)]
struct Entry {
    /// Registered name, without namespace or type suffix.
    name: String,
    prefixed: bool,
    family: Family,
}

/// Metric families gathered during one scrape, in insertion order.
///
/// Families live either in the `frr` namespace or, for process-wide
/// metrics with conventional names such as `process_cpu_seconds_total`,
/// without a namespace.
#[derive(Debug, Default)]
pub struct ScrapeRegistry {
    entries: Vec<Entry>,
    /// Qualified family name to entry position.
    index: HashMap<String, usize>,
    /// Written sample name to the qualified family writing it.
    samples: HashMap<String, String>,
}

impl ScrapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample to the `frr` namespace.
    ///
    /// The first sample of a family fixes its type and help text. Within a
    /// family, a repeated label set replaces the earlier value.
    pub fn add(&mut self, sample: MetricSample) -> Result<(), RegistryError> {
        self.add_sample(sample, true)
    }

    /// Add one sample outside the `frr` namespace.
    pub fn add_unprefixed(&mut self, sample: MetricSample) -> Result<(), RegistryError> {
        self.add_sample(sample, false)
    }

    /// Add every sample, dropping (and returning) the ones that conflict.
    pub fn extend(&mut self, samples: impl IntoIterator<Item = MetricSample>) -> Vec<RegistryError> {
        samples
            .into_iter()
            .filter_map(|sample| self.add(sample).err())
            .collect()
    }

    /// Expose a process-wide counter. The counter is shared, not copied.
    pub fn add_shared_counter(
        &mut self,
        name: &str,
        help: &str,
        counter: &Counter,
    ) -> Result<(), RegistryError> {
        self.insert_new(
            sanitize_metric_name(name),
            true,
            Family::SharedCounter {
                help: help.to_string(),
                counter: counter.clone(),
            },
        )
    }

    /// Expose an info metric (`<name>_info{labels} 1`).
    pub fn add_info(&mut self, name: &str, help: &str, labels: Labels) -> Result<(), RegistryError> {
        self.insert_new(
            sanitize_metric_name(name),
            true,
            Family::Info {
                help: help.to_string(),
                labels,
            },
        )
    }

    /// Number of metric families.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a `frr` family with this name (without namespace or `_total`) exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&qualified(name, true))
    }

    /// Encode all families as OpenMetrics text.
    ///
    /// On failure the partially written text is carried in the
    /// [`EncodeError`] so the caller can still serve it.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let registry = self.build();
        let mut buffer = String::new();
        match encode(&mut buffer, &registry) {
            Ok(()) => Ok(buffer),
            Err(source) => Err(EncodeError {
                partial: buffer,
                source,
            }),
        }
    }

    fn add_sample(&mut self, sample: MetricSample, prefixed: bool) -> Result<(), RegistryError> {
        let name = family_name(&sample);
        let labels: Labels = sample
            .labels
            .into_iter()
            .map(|(k, v)| (sanitize_label_name(&k), v))
            .collect();

        match self.lookup(&qualified(&name, prefixed), FamilyKind::Samples(sample.kind))? {
            Some(position) => {
                if let Family::Samples { series, .. } = &mut self.entries[position].family {
                    series.insert(labels, sample.value);
                }
                Ok(())
            }
            None => {
                let mut series = BTreeMap::new();
                series.insert(labels, sample.value);
                self.insert_new(
                    name,
                    prefixed,
                    Family::Samples {
                        kind: sample.kind,
                        help: sample.help,
                        series,
                    },
                )
            }
        }
    }

    fn build(&self) -> Registry {
        let mut registry = Registry::default();
        for entry in self.entries.iter().filter(|e| !e.prefixed) {
            register(&mut registry, entry);
        }

        let namespaced = registry.sub_registry_with_prefix(NAMESPACE);
        for entry in self.entries.iter().filter(|e| e.prefixed) {
            register(namespaced, entry);
        }

        registry
    }

    /// Position of family `qualified` if it has the requested kind, `None` if absent.
    fn lookup(&self, qualified: &str, requested: FamilyKind) -> Result<Option<usize>, RegistryError> {
        let Some(&position) = self.index.get(qualified) else {
            return Ok(None);
        };
        let existing = self.entries[position].family.kind();
        if existing != requested {
            return Err(RegistryError::KindConflict {
                name: qualified.to_string(),
                existing: existing.as_str(),
                requested: requested.as_str(),
            });
        }
        Ok(Some(position))
    }

    /// Add a family that must not exist yet, under its family and sample names.
    fn insert_new(&mut self, name: String, prefixed: bool, family: Family) -> Result<(), RegistryError> {
        let kind = family.kind();
        let family_key = qualified(&name, prefixed);
        if self.lookup(&family_key, kind)?.is_some() {
            return Err(RegistryError::KindConflict {
                name: family_key,
                existing: kind.as_str(),
                requested: kind.as_str(),
            });
        }

        let sample = kind.sample_name(&family_key);
        let clash = self
            .samples
            .get(&sample)
            .or_else(|| self.samples.get(&family_key));
        if let Some(existing) = clash {
            return Err(RegistryError::NameCollision {
                family: family_key,
                sample,
                existing: existing.clone(),
            });
        }

        self.samples.insert(sample, family_key.clone());
        self.index.insert(family_key, self.entries.len());
        self.entries.push(Entry {
            name,
            prefixed,
            family,
        });
        Ok(())
    }
}

fn register(registry: &mut Registry, entry: &Entry) {
    let name = entry.name.as_str();
    match &entry.family {
        Family::Samples {
            kind: MetricKind::Gauge,
            help,
            series,
        } => {
            let metric = MetricFamily::<Labels, Gauge<f64, AtomicU64>>::default();
            for (labels, value) in series {
                metric.get_or_create(labels).set(*value);
            }
            registry.register(name, registered_help(help), metric);
        }
        Family::Samples {
            kind: MetricKind::Counter,
            help,
            series,
        } => {
            let metric = MetricFamily::<Labels, Counter<f64, AtomicU64>>::default();
            for (labels, value) in series {
                metric.get_or_create(labels).inc_by(*value);
            }
            registry.register(name, registered_help(help), metric);
        }
        Family::SharedCounter { help, counter } => {
            registry.register(name, registered_help(help), counter.clone());
        }
        Family::Info { help, labels } => {
            registry.register(name, registered_help(help), Info::new(labels.clone()));
        }
    }
}

/// Family name as written in the output.
fn qualified(name: &str, prefixed: bool) -> String {
    if prefixed {
        format!("{}_{}", NAMESPACE, name)
    } else {
        name.to_string()
    }
}

/// Registry name of a sample: sanitized, without a trailing `_total` on counters.
fn family_name(sample: &MetricSample) -> String {
    let name = sanitize_metric_name(&sample.name);
    match sample.kind {
        MetricKind::Counter => name
            .strip_suffix("_total")
            .map(str::to_string)
            .unwrap_or(name),
        MetricKind::Gauge => name,
    }
}

/// prometheus-client appends a period to every help text.
fn registered_help(help: &str) -> &str {
    help.trim_end().trim_end_matches('.')
}
