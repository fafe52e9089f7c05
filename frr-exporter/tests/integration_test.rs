//! Integration tests for the exporter.
//!
//! These tests drive full scrapes through real `vtysh` stand-ins (shell
//! scripts written to a temporary directory) and through the HTTP server.

#![cfg(unix)]

use std::io::Write;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use frr_collector_framework::{
    CollectError, Collector, CollectorCatalog, CollectorSwitches, CommandRunner, Emitter,
    FailureCounter, FailureObserver, Metadata, MetricSample, VtyshRunner, async_trait,
};
use frr_exporter::config::{self, ExporterConfig, VtyshConfig};
use frr_exporter::{AppState, BaselineMetrics, Exporter, HttpServer};
use frr_exporter_common::LoggingConfig;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Write an executable `vtysh` stand-in whose body sees the command as `$2`.
fn fake_vtysh(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("vtysh");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{}", body).unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Collector that runs its own name as a command and reports the number printed.
struct Stub {
    name: &'static str,
    enabled_by_default: bool,
    invocations: Arc<AtomicUsize>,
    failures: FailureCounter,
}

impl Stub {
    fn new(name: &'static str, enabled_by_default: bool) -> (Arc<Self>, Arc<AtomicUsize>) {
        let invocations = Arc::new(AtomicUsize::new(0));
        let stub = Arc::new(Self {
            name,
            enabled_by_default,
            invocations: invocations.clone(),
            failures: FailureCounter::new(),
        });
        (stub, invocations)
    }
}

impl Metadata for Stub {
    fn name(&self) -> &str {
        self.name
    }

    fn help(&self) -> &str {
        "Stub collector"
    }

    fn enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }
}

#[async_trait]
impl Emitter for Stub {
    async fn collect(&self, runner: &dyn CommandRunner) -> Result<Vec<MetricSample>, CollectError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let output = runner.run(self.name).await?;
        let value: f64 = output
            .trim()
            .parse()
            .map_err(|_| CollectError::parse(self.name, format!("not a number: {:?}", output)))?;
        Ok(vec![
            MetricSample::gauge(format!("stub_{}", self.name), "Stub value.", value)
                .with_label("stub", self.name),
        ])
    }
}

impl Collector for Stub {
    fn failure_observer(&self) -> Option<&dyn FailureObserver> {
        Some(&self.failures)
    }
}

struct Harness {
    exporter: Exporter,
    invocations: Vec<(&'static str, Arc<AtomicUsize>)>,
}

impl Harness {
    /// Build an exporter over stubs, resolving enablement from `args`.
    fn new(
        stubs: &[(&'static str, bool)],
        args: &[&str],
        vtysh: PathBuf,
        timeout: Duration,
    ) -> Self {
        let mut catalog = CollectorCatalog::new();
        let mut invocations = Vec::new();
        for &(name, enabled) in stubs {
            let (stub, counter) = Stub::new(name, enabled);
            catalog.register(stub).unwrap();
            invocations.push((name, counter));
        }

        let switches = CollectorSwitches::new(catalog.descriptors());
        let (_, enablement) = config::parse_from(
            &switches,
            std::iter::once("frr-exporter").chain(args.iter().copied()),
        )
        .unwrap();

        let exporter = Exporter::new(
            catalog.enabled(&enablement),
            Arc::new(VtyshRunner::new(vtysh, timeout)),
            timeout,
            Arc::new(BaselineMetrics::new("test")),
        );
        Self {
            exporter,
            invocations,
        }
    }

    fn invocations(&self, name: &str) -> usize {
        self.invocations
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c.load(Ordering::SeqCst))
            .unwrap_or_default()
    }
}

const STUB_SCRIPT: &str = r#"
case "$2" in
  a) echo 1 ;;
  b) exec sleep 30 ;;
  c) echo 3 ;;
  broken) echo "% Unknown command" >&2; exit 1 ;;
  garbage) echo "not json at all" ;;
  *) echo 0 ;;
esac
"#;

#[tokio::test]
async fn test_hung_command_scenario() {
    // A enabled, B enabled but hangs, C disabled by default.
    let dir = TempDir::new().unwrap();
    let timeout = Duration::from_millis(300);
    let harness = Harness::new(
        &[("a", true), ("b", true), ("c", false)],
        &[],
        fake_vtysh(&dir, STUB_SCRIPT),
        timeout,
    );

    let start = Instant::now();
    let scrape = harness.exporter.scrape().await;
    let elapsed = start.elapsed();

    assert!(elapsed < timeout * 2 + Duration::from_secs(1), "{:?}", elapsed);

    let b = scrape.outcomes.iter().find(|o| o.collector == "b").unwrap();
    assert!(!b.success());
    assert!(b.error.as_ref().unwrap().is_timeout());
    assert!(b.duration >= timeout);
    assert!(b.duration < timeout + Duration::from_secs(1));

    let text = scrape.registry.encode().unwrap();
    assert!(text.contains("frr_collector_up{collector=\"a\"} 1"), "{}", text);
    assert!(text.contains("frr_stub_a{stub=\"a\"} 1"), "{}", text);
    assert!(text.contains("frr_collector_up{collector=\"b\"} 0"), "{}", text);
    assert!(text.contains("frr_scrape_duration_seconds{collector=\"b\"}"), "{}", text);
    assert!(!text.contains("frr_stub_b"), "{}", text);
    assert!(!text.contains("\"c\""), "{}", text);
    assert_eq!(harness.invocations("c"), 0);
}

#[tokio::test]
async fn test_every_outcome_reported_for_any_number_of_failures() {
    let dir = TempDir::new().unwrap();
    let vtysh = fake_vtysh(&dir, STUB_SCRIPT);

    let cases: [(&[(&str, bool)], usize); 4] = [
        (&[("a", true), ("c", true)], 0),
        (&[("a", true), ("broken", true), ("c", true)], 1),
        (&[("broken", true), ("garbage", true), ("c", true)], 2),
        (&[("broken", true), ("garbage", true)], 2),
    ];

    for (stubs, failing) in cases {
        let harness = Harness::new(stubs, &[], vtysh.clone(), Duration::from_secs(5));
        let scrape = harness.exporter.scrape().await;

        assert_eq!(scrape.outcomes.len(), stubs.len());
        assert_eq!(scrape.outcomes.iter().filter(|o| !o.success()).count(), failing);

        let text = scrape.registry.encode().unwrap();
        assert!(text.ends_with("# EOF\n"));
        for outcome in &scrape.outcomes {
            let up = format!(
                "frr_collector_up{{collector=\"{}\"}} {}",
                outcome.collector,
                if outcome.success() { 1 } else { 0 }
            );
            assert!(text.contains(&up), "{}", text);
            let series = format!("frr_stub_{}{{", outcome.collector);
            assert_eq!(text.contains(&series), outcome.success(), "{}", text);
        }
    }
}

#[tokio::test]
async fn test_disabled_collector_is_never_invoked() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(
        &[("a", true), ("c", true)],
        &["--no-collector.c"],
        fake_vtysh(&dir, STUB_SCRIPT),
        Duration::from_secs(5),
    );

    for _ in 0..3 {
        let text = harness.exporter.scrape().await.registry.encode().unwrap();
        assert!(!text.contains("frr_stub_c"), "{}", text);
        assert!(!text.contains("collector=\"c\""), "{}", text);
    }
    assert_eq!(harness.invocations("a"), 3);
    assert_eq!(harness.invocations("c"), 0);
}

#[tokio::test]
async fn test_consecutive_scrapes_are_independent() {
    let dir = TempDir::new().unwrap();
    // The first call prints a number, later calls print garbage.
    let marker = dir.path().join("called");
    let script = format!(
        "if [ -e {m} ]; then echo garbage; else touch {m}; echo 5; fi",
        m = marker.display()
    );
    let harness = Harness::new(
        &[("a", true)],
        &[],
        fake_vtysh(&dir, &script),
        Duration::from_secs(5),
    );

    let first = harness.exporter.scrape().await.registry.encode().unwrap();
    let second = harness.exporter.scrape().await.registry.encode().unwrap();

    assert!(first.contains("frr_stub_a{stub=\"a\"} 5"), "{}", first);
    assert!(first.contains("frr_collector_up{collector=\"a\"} 1"), "{}", first);

    assert!(!second.contains("frr_stub_a"), "{}", second);
    assert!(second.contains("frr_collector_up{collector=\"a\"} 0"), "{}", second);
    assert!(second.contains("frr_scrape_errors_total{collector=\"a\"} 1"), "{}", second);
    assert_eq!(second.matches("# TYPE frr_collector_up gauge").count(), 1);
}

#[test]
fn test_builtin_collector_defaults() {
    let catalog = frr_collectors::catalog().unwrap();
    let switches = CollectorSwitches::new(catalog.descriptors());

    let (_, enablement) = config::parse_from(&switches, ["frr-exporter"]).unwrap();
    assert_eq!(catalog.enabled(&enablement).names(), vec!["bgp", "ospf", "bfd"]);

    let (_, enablement) =
        config::parse_from(&switches, ["frr-exporter", "--collector.bgp6"]).unwrap();
    assert_eq!(
        catalog.enabled(&enablement).names(),
        vec!["bgp", "ospf", "bgp6", "bfd"]
    );
}

/// Launch the binary with `args` and return its stderr, asserting it exited
/// with an error and never listened on its address.
async fn launch_expecting_failure(args: &[&str]) -> String {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let listen = format!("127.0.0.1:{}", port);

    let output = tokio::time::timeout(
        Duration::from_secs(30),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_frr-exporter"))
            .args(["--web.listen-address", &listen])
            .args(args)
            .output(),
    )
    .await
    .expect("exporter did not exit")
    .unwrap();

    assert!(!output.status.success());
    assert!(tokio::net::TcpStream::connect(listen.as_str()).await.is_err());
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[tokio::test]
async fn test_invalid_timeout_exits_before_binding() {
    let stderr = launch_expecting_failure(&["--frr.vtysh.timeout", "notaduration"]).await;

    assert!(stderr.contains("--frr.vtysh.timeout"), "{}", stderr);
    assert!(stderr.contains("notaduration"), "{}", stderr);
}

#[tokio::test]
async fn test_wildcard_telemetry_path_exits_before_binding() {
    let stderr = launch_expecting_failure(&["--web.telemetry-path", "/metrics/*"]).await;

    assert!(stderr.contains("--web.telemetry-path"), "{}", stderr);
    assert!(stderr.contains("/metrics/*"), "{}", stderr);
    assert!(!stderr.contains("panicked"), "{}", stderr);
}

const FRR_SCRIPT: &str = r#"
[ "$1" = "-c" ] || exit 2
case "$2" in
  "show bgp vrf all ipv4 unicast summary json")
    echo '{"default":{"as":65001,"vrfName":"default","peers":{"10.1.1.2":{"remoteAs":65002,"state":"Established","peerUptimeMsec":5000,"pfxRcd":7,"msgRcvd":10,"msgSent":11}}}}'
    ;;
  "show ip ospf vrf all interface json")
    echo "Exiting: failed to connect to any daemons." >&2
    exit 1
    ;;
  "show bfd peers json")
    echo '[]'
    ;;
esac
"#;

#[tokio::test]
async fn test_http_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(ExporterConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        telemetry_path: "/metrics".to_string(),
        vtysh: VtyshConfig {
            path: fake_vtysh(&dir, FRR_SCRIPT),
            timeout: Duration::from_secs(5),
        },
        logging: LoggingConfig::default(),
    });

    let catalog = frr_collectors::catalog().unwrap();
    let switches = CollectorSwitches::new(catalog.descriptors());
    let (_, enablement) = config::parse_from(&switches, ["frr-exporter"]).unwrap();
    let runner = Arc::new(VtyshRunner::new(
        config.vtysh.path.clone(),
        config.vtysh.timeout,
    ));
    let state = AppState::new(
        catalog.enabled(&enablement),
        runner,
        config.clone(),
        Arc::new(BaselineMetrics::new("test")),
    );

    let listener = TcpListener::bind(config.listen).await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(HttpServer::new(state, config.listen).serve(listener, shutdown_rx));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/openmetrics-text")
    );
    let body = response.text().await.unwrap();

    assert!(body.contains("frr_collector_up{collector=\"bgp\"} 1"), "{}", body);
    assert!(body.contains("frr_collector_up{collector=\"ospf\"} 0"), "{}", body);
    assert!(body.contains("frr_collector_up{collector=\"bfd\"} 1"), "{}", body);
    assert!(body.contains("frr_bgp_peer_state{"), "{}", body);
    assert!(body.contains("frr_bgp_peer_message_sent_total{"), "{}", body);
    assert!(body.contains("frr_bfd_peer_count 0"), "{}", body);
    assert!(body.contains("frr_scrape_errors_total{collector=\"ospf\"} 1"), "{}", body);
    assert!(!body.contains("frr_ospf_neighbors"), "{}", body);
    #[cfg(target_os = "linux")]
    assert!(body.contains("\nprocess_resident_memory_bytes "), "{}", body);

    let body = client
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("href=\"/metrics\""));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
