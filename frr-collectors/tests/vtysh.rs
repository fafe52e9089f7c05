//! Collectors driven through a real process standing in for `vtysh`.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use frr_collector_framework::{CommandRunner, Emitter, FailureObserver, Collector, VtyshRunner};
use frr_collectors::{BfdCollector, BgpCollector, OspfCollector};
use tempfile::TempDir;

/// Write an executable script that answers `-c <command>` like vtysh would.
fn fake_vtysh(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("vtysh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{}", body).unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const SCRIPT: &str = r#"
[ "$1" = "-c" ] || exit 2
case "$2" in
  "show bgp vrf all ipv4 unicast summary json")
    echo '{"default":{"as":65001,"vrfName":"default","peers":{"10.1.1.2":{"remoteAs":65002,"state":"Established","peerUptimeMsec":5000,"pfxRcd":7,"msgRcvd":10,"msgSent":11}}}}'
    ;;
  "show ip ospf vrf all interface json")
    echo '{"default":{"vrfName":"default","interfaces":{"eth0":{"area":"0.0.0.0","nbrCount":1,"nbrAdjacentCount":1}}}}'
    ;;
  "show bfd peers json")
    echo '[{"peer":"10.0.0.2","local":"10.0.0.1","vrf":"default","status":"up","uptime":12}]'
    ;;
  *)
    echo "% Unknown command: $2" >&2
    exit 1
    ;;
esac
"#;

#[tokio::test]
async fn test_collectors_against_fake_shell() {
    let dir = TempDir::new().unwrap();
    let runner = VtyshRunner::new(fake_vtysh(&dir, SCRIPT), Duration::from_secs(5));

    let bgp = BgpCollector::ipv4().collect(&runner).await.unwrap();
    assert!(
        bgp.iter()
            .any(|s| s.name == "bgp_peer_prefixes_received_count" && s.value == 7.0)
    );

    let ospf = OspfCollector::new().collect(&runner).await.unwrap();
    assert_eq!(ospf.len(), 2);

    let bfd = BfdCollector::new().collect(&runner).await.unwrap();
    assert!(bfd.iter().any(|s| s.name == "bfd_peer_uptime_seconds" && s.value == 12.0));
}

#[tokio::test]
async fn test_unknown_command_is_execution_failure() {
    let dir = TempDir::new().unwrap();
    let runner = VtyshRunner::new(fake_vtysh(&dir, SCRIPT), Duration::from_secs(5));

    // The script only knows the IPv4 summary.
    let err = BgpCollector::ipv6().collect(&runner).await.unwrap_err();

    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("Unknown command"));
}

#[tokio::test]
async fn test_garbage_output_is_parse_failure() {
    let dir = TempDir::new().unwrap();
    let runner = VtyshRunner::new(
        fake_vtysh(&dir, "echo 'Exiting: failed to connect to any daemons.'"),
        Duration::from_secs(5),
    );

    let err = BfdCollector::new().collect(&runner).await.unwrap_err();
    assert_eq!(err.kind(), "parse");
}

#[tokio::test]
async fn test_hung_shell_times_out() {
    let dir = TempDir::new().unwrap();
    let runner = VtyshRunner::new(fake_vtysh(&dir, "exec sleep 30"), Duration::from_millis(200));
    assert_eq!(runner.timeout(), Duration::from_millis(200));

    let collector = OspfCollector::new();
    let err = collector.collect(&runner).await.unwrap_err();
    assert!(err.is_timeout());

    // Recording is the caller's job; the collector only exposes the counter.
    let observer = collector.failure_observer().unwrap();
    assert_eq!(observer.failures_total(), 0);
    observer.record_failure(&err);
    assert_eq!(observer.failures_total(), 1);
}
