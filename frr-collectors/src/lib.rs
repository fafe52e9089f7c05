//! Protocol collectors for the FRR exporter.
//!
//! Each collector runs one `vtysh` command with JSON output and turns the
//! result into metric samples:
//!
//! - [`bgp::BgpCollector`] - BGP unicast peers, IPv4 (`bgp`) and IPv6 (`bgp6`)
//! - [`ospf::OspfCollector`] - OSPF interface neighbors (`ospf`)
//! - [`bfd::BfdCollector`] - BFD sessions (`bfd`)

use std::sync::Arc;

use frr_collector_framework::{CatalogError, CollectError, CollectorCatalog};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod bfd;
pub mod bgp;
pub mod ospf;

pub use bfd::BfdCollector;
pub use bgp::{AddressFamily, BgpCollector};
pub use ospf::OspfCollector;

/// Catalog of every built-in collector, in scrape order.
pub fn catalog() -> Result<CollectorCatalog, CatalogError> {
    CollectorCatalog::new()
        .with(Arc::new(BgpCollector::ipv4()))?
        .with(Arc::new(OspfCollector::new()))?
        .with(Arc::new(BgpCollector::ipv6()))?
        .with(Arc::new(BfdCollector::new()))
}

/// Parse `vtysh` JSON output. Blank output means "nothing configured".
pub(crate) fn parse_json<T>(command: &str, output: &str) -> Result<T, CollectError>
where
    T: DeserializeOwned + Default,
{
    let output = output.trim();
    if output.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(output).map_err(|e| CollectError::parse(command, e.to_string()))
}

/// Render a JSON scalar as a label value.
pub(crate) fn value_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
