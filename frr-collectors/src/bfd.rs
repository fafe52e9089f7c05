//! BFD peer metrics from `show bfd peers json`.

use frr_collector_framework::{
    Collector, CollectError, CommandRunner, Emitter, FailureCounter, FailureObserver, Metadata,
    MetricSample, async_trait,
};
use serde::Deserialize;

use crate::parse_json;

const COMMAND: &str = "show bfd peers json";

#[derive(Debug, Default)]
pub struct BfdCollector {
    failures: FailureCounter,
}

impl BfdCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, output: &str) -> Result<Vec<MetricSample>, CollectError> {
        let peers: Vec<Peer> = parse_json(COMMAND, output)?;
        let mut samples = Vec::with_capacity(1 + peers.len() * 2);

        samples.push(MetricSample::gauge(
            "bfd_peer_count",
            "Number of configured BFD peers.",
            peers.len() as f64,
        ));

        for peer in &peers {
            let labelled = |sample: MetricSample| {
                sample
                    .with_label("local", peer.local.as_deref().unwrap_or_default())
                    .with_label("peer", peer.peer.as_str())
                    .with_label("vrf", peer.vrf.as_deref().unwrap_or("default"))
            };

            samples.push(labelled(MetricSample::gauge(
                "bfd_peer_state",
                "State of the BFD session (1 = up, 0 = any other state).",
                if peer.status.eq_ignore_ascii_case("up") { 1.0 } else { 0.0 },
            )));

            if let Some(uptime) = peer.uptime {
                samples.push(labelled(MetricSample::gauge(
                    "bfd_peer_uptime_seconds",
                    "How long the BFD session has been up.",
                    uptime,
                )));
            }
        }

        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
struct Peer {
    peer: String,
    local: Option<String>,
    vrf: Option<String>,
    status: String,
    uptime: Option<f64>,
}

impl Metadata for BfdCollector {
    fn name(&self) -> &str {
        "bfd"
    }

    fn help(&self) -> &str {
        "Collect BFD metrics"
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}

#[async_trait]
impl Emitter for BfdCollector {
    async fn collect(&self, runner: &dyn CommandRunner) -> Result<Vec<MetricSample>, CollectError> {
        let output = runner.run(COMMAND).await?;
        self.parse(&output)
    }
}

impl Collector for BfdCollector {
    fn failure_observer(&self) -> Option<&dyn FailureObserver> {
        Some(&self.failures)
    }
}
