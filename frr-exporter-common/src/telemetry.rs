//! Metric samples produced by protocol collectors.

use std::fmt;

/// Metric type of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Value that can go up or down.
    Gauge,
    /// Monotonically increasing value. Exposed with a `_total` suffix.
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metric sample emitted by a collector during one scrape.
///
/// `name` carries neither the exporter namespace nor the `_total` counter
/// suffix; both are added when the sample lands in a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Metric family name (e.g., "bgp_peer_state").
    pub name: String,

    /// Help text of the metric family.
    pub help: String,

    /// Gauge or counter.
    pub kind: MetricKind,

    /// Label pairs, in insertion order.
    pub labels: Vec<(String, String)>,

    /// The sampled value.
    pub value: f64,
}

impl MetricSample {
    /// Create a gauge sample.
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Gauge, value)
    }

    /// Create a counter sample.
    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Counter, value)
    }

    fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: sanitize_metric_name(&name.into()),
            help: help.into(),
            kind,
            labels: Vec::new(),
            value,
        }
    }

    /// Add a label to this sample.
    pub fn with_label(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        let key = sanitize_label_name(key.as_ref());
        let value = value.into();
        match self.labels.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.labels.push((key, value)),
        }
        self
    }

    /// Look up a label value by key.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sanitize a metric name to be Prometheus-compatible.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
/// Invalid characters become underscores, runs of underscores collapse, and a
/// leading digit gets an underscore prefix.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut last_was_underscore = false;

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
        last_was_underscore = true;
    }

    for c in name.chars() {
        if c == '_' || !(c.is_ascii_alphanumeric() || c == ':') {
            if !last_was_underscore {
                result.push('_');
                last_was_underscore = true;
            }
        } else {
            result.push(c);
            last_was_underscore = false;
        }
    }

    while result.ends_with('_') && result.len() > 1 {
        result.pop();
    }

    if result.is_empty() || result == "_" {
        return "unnamed".to_string();
    }

    result
}

/// Sanitize a label name to be Prometheus-compatible.
///
/// Label names must match `[a-zA-Z_][a-zA-Z0-9_]*`; names starting with `__`
/// are reserved and get a `z` prefix.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for (i, c) in name.chars().enumerate() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };

        if valid {
            result.push(c);
            last_was_underscore = c == '_';
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        return "label".to_string();
    }

    if result.starts_with("__") {
        result.insert(0, 'z');
    }

    result
}
