//! Metrics about the exporter process itself.
//!
//! Exposed without the `frr` namespace under the names Prometheus client
//! libraries conventionally use (`process_cpu_seconds_total`, ...), so
//! existing dashboards and alerts work unchanged.

use std::fmt;

use frr_exporter_common::MetricSample;
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::warn;

/// Samples the current process through `sysinfo`.
pub struct ProcessMetrics {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessMetrics {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = e, "Process metrics are not supported on this platform");
                None
            }
        };

        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }

    /// Refresh and return the current values. Empty when the process
    /// cannot be inspected.
    pub fn samples(&self) -> Vec<MetricSample> {
        let Some(pid) = self.pid else {
            return Vec::new();
        };

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        let Some(process) = system.process(pid) else {
            return Vec::new();
        };

        vec![
            MetricSample::counter(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
                process.accumulated_cpu_time() as f64 / 1000.0,
            ),
            MetricSample::gauge(
                "process_resident_memory_bytes",
                "Resident memory size in bytes.",
                process.memory() as f64,
            ),
            MetricSample::gauge(
                "process_virtual_memory_bytes",
                "Virtual memory size in bytes.",
                process.virtual_memory() as f64,
            ),
            MetricSample::gauge(
                "process_start_time_seconds",
                "Start time of the process since unix epoch in seconds.",
                process.start_time() as f64,
            ),
        ]
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessMetrics")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
