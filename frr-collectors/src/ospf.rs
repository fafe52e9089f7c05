//! OSPF interface neighbor metrics.

use std::collections::BTreeMap;

use frr_collector_framework::{
    Collector, CollectError, CommandRunner, Emitter, FailureCounter, FailureObserver, Metadata,
    MetricSample, async_trait,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::parse_json;

const COMMAND: &str = "show ip ospf vrf all interface json";

/// Keys that sit next to the interfaces in the per-VRF object of older FRR releases.
const VRF_METADATA_KEYS: [&str; 2] = ["vrfName", "vrfId"];

#[derive(Debug, Default)]
pub struct OspfCollector {
    failures: FailureCounter,
}

impl OspfCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the JSON interface listing into samples.
    ///
    /// Newer FRR releases nest interfaces under an `interfaces` key; older
    /// ones put them directly in the VRF object. Both layouts are accepted.
    /// Interfaces without an area do not run OSPF and are skipped.
    pub fn parse(&self, output: &str) -> Result<Vec<MetricSample>, CollectError> {
        let vrfs: BTreeMap<String, Map<String, Value>> = parse_json(COMMAND, output)?;
        let mut samples = Vec::new();

        for (vrf_key, vrf) in vrfs {
            let vrf_name = vrf
                .get("vrfName")
                .and_then(Value::as_str)
                .unwrap_or(&vrf_key)
                .to_string();

            let interfaces: Vec<(String, Value)> = match vrf.get("interfaces") {
                Some(Value::Object(nested)) => nested
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                Some(_) => {
                    return Err(CollectError::parse(
                        COMMAND,
                        format!("'interfaces' of VRF '{}' is not an object", vrf_name),
                    ));
                }
                None => vrf
                    .into_iter()
                    .filter(|(k, _)| !VRF_METADATA_KEYS.contains(&k.as_str()))
                    .collect(),
            };

            for (iface_name, value) in interfaces {
                let iface: Interface = serde_json::from_value(value).map_err(|e| {
                    CollectError::parse(COMMAND, format!("interface '{}': {}", iface_name, e))
                })?;
                let Some(area) = iface.area else {
                    trace!(vrf = %vrf_name, iface = %iface_name, "Interface has no OSPF area, skipping");
                    continue;
                };

                let labelled = |sample: MetricSample| {
                    sample
                        .with_label("vrf", vrf_name.as_str())
                        .with_label("iface", iface_name.as_str())
                        .with_label("area", area.as_str())
                };

                samples.push(labelled(MetricSample::gauge(
                    "ospf_neighbors",
                    "Number of neighbors detected on the interface.",
                    iface.nbr_count.unwrap_or(0.0),
                )));
                samples.push(labelled(MetricSample::gauge(
                    "ospf_neighbor_adjacencies",
                    "Number of neighbor adjacencies formed on the interface.",
                    iface.nbr_adjacent_count.unwrap_or(0.0),
                )));
            }
        }

        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Interface {
    area: Option<String>,
    nbr_count: Option<f64>,
    nbr_adjacent_count: Option<f64>,
}

impl Metadata for OspfCollector {
    fn name(&self) -> &str {
        "ospf"
    }

    fn help(&self) -> &str {
        "Collect OSPF metrics"
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}

#[async_trait]
impl Emitter for OspfCollector {
    async fn collect(&self, runner: &dyn CommandRunner) -> Result<Vec<MetricSample>, CollectError> {
        let output = runner.run(COMMAND).await?;
        self.parse(&output)
    }
}

impl Collector for OspfCollector {
    fn failure_observer(&self) -> Option<&dyn FailureObserver> {
        Some(&self.failures)
    }
}
