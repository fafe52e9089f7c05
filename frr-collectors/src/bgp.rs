//! BGP peer metrics from `show bgp vrf all <afi> unicast summary json`.

use std::collections::BTreeMap;

use frr_collector_framework::{
    Collector, CollectError, CommandRunner, Emitter, FailureCounter, FailureObserver, Metadata,
    MetricSample, async_trait,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{parse_json, value_label};

const SAFI: &str = "unicast";

/// Address family a [`BgpCollector`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        }
    }
}

/// Collector for BGP unicast peer state, one address family per instance.
#[derive(Debug)]
pub struct BgpCollector {
    afi: AddressFamily,
    command: String,
    failures: FailureCounter,
}

impl BgpCollector {
    /// IPv4 unicast peers, registered as `bgp`.
    pub fn ipv4() -> Self {
        Self::new(AddressFamily::Ipv4)
    }

    /// IPv6 unicast peers, registered as `bgp6`.
    pub fn ipv6() -> Self {
        Self::new(AddressFamily::Ipv6)
    }

    fn new(afi: AddressFamily) -> Self {
        Self {
            afi,
            command: format!("show bgp vrf all {} {} summary json", afi.as_str(), SAFI),
            failures: FailureCounter::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Turn the JSON summary into samples.
    pub fn parse(&self, output: &str) -> Result<Vec<MetricSample>, CollectError> {
        let summary: BTreeMap<String, VrfSummary> = parse_json(&self.command, output)?;
        let afi = self.afi.as_str();
        let mut samples = Vec::new();

        for (vrf_key, vrf) in &summary {
            let vrf_name = vrf.vrf_name.as_deref().unwrap_or(vrf_key);
            let local_as = value_label(vrf.local_as.as_ref());

            let base = |sample: MetricSample| {
                sample
                    .with_label("vrf", vrf_name)
                    .with_label("afi", afi)
                    .with_label("safi", SAFI)
                    .with_label("local_as", local_as.clone())
            };

            samples.push(base(MetricSample::gauge(
                "bgp_peers_count",
                "Number of configured BGP peers.",
                vrf.peers.len() as f64,
            )));

            for (address, peer) in &vrf.peers {
                let peer_as = value_label(peer.remote_as.as_ref());
                let labelled = |sample: MetricSample| {
                    base(sample)
                        .with_label("peer", address.as_str())
                        .with_label("peer_as", peer_as.clone())
                };

                let established = peer.state.as_deref() == Some("Established");
                samples.push(labelled(MetricSample::gauge(
                    "bgp_peer_state",
                    "State of the BGP peer (1 = Established, 0 = any other state).",
                    if established { 1.0 } else { 0.0 },
                )));

                if let Some(msec) = peer.peer_uptime_msec {
                    samples.push(labelled(MetricSample::gauge(
                        "bgp_peer_uptime_seconds",
                        "How long the BGP session has been in its current state.",
                        msec / 1000.0,
                    )));
                }

                if let Some(received) = peer.pfx_rcd.or(peer.prefix_received_count) {
                    samples.push(labelled(MetricSample::gauge(
                        "bgp_peer_prefixes_received_count",
                        "Number of prefixes received from the BGP peer.",
                        received,
                    )));
                }

                if let Some(received) = peer.msg_rcvd {
                    samples.push(labelled(MetricSample::counter(
                        "bgp_peer_message_received",
                        "Number of BGP messages received from the peer.",
                        received,
                    )));
                }

                if let Some(sent) = peer.msg_sent {
                    samples.push(labelled(MetricSample::counter(
                        "bgp_peer_message_sent",
                        "Number of BGP messages sent to the peer.",
                        sent,
                    )));
                }
            }
        }

        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VrfSummary {
    #[serde(rename = "as")]
    local_as: Option<Value>,
    vrf_name: Option<String>,
    #[serde(default)]
    peers: BTreeMap<String, Peer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Peer {
    remote_as: Option<Value>,
    state: Option<String>,
    peer_uptime_msec: Option<f64>,
    pfx_rcd: Option<f64>,
    prefix_received_count: Option<f64>,
    msg_rcvd: Option<f64>,
    msg_sent: Option<f64>,
}

impl Metadata for BgpCollector {
    fn name(&self) -> &str {
        match self.afi {
            AddressFamily::Ipv4 => "bgp",
            AddressFamily::Ipv6 => "bgp6",
        }
    }

    fn help(&self) -> &str {
        match self.afi {
            AddressFamily::Ipv4 => "Collect BGP IPv4 unicast metrics",
            AddressFamily::Ipv6 => "Collect BGP IPv6 unicast metrics",
        }
    }

    fn enabled_by_default(&self) -> bool {
        self.afi == AddressFamily::Ipv4
    }
}

#[async_trait]
impl Emitter for BgpCollector {
    async fn collect(&self, runner: &dyn CommandRunner) -> Result<Vec<MetricSample>, CollectError> {
        let output = runner.run(&self.command).await?;
        self.parse(&output)
    }
}

impl Collector for BgpCollector {
    fn failure_observer(&self) -> Option<&dyn FailureObserver> {
        Some(&self.failures)
    }
}
