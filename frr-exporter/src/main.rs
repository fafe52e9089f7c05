//! Prometheus exporter for FRRouting.

use std::sync::Arc;
use std::time::Duration;

use frr_collector_framework::{CollectorSwitches, CommandRunner, VtyshRunner};
use frr_exporter::config::{self, ExporterConfig};
use frr_exporter::{AppState, BaselineMetrics, HttpServer};
use frr_exporter_common::init_tracing;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let catalog = frr_collectors::catalog()?;
    let switches = CollectorSwitches::new(catalog.descriptors());

    let (args, enablement) =
        config::parse_from(&switches, std::env::args_os()).unwrap_or_else(|e| e.exit());

    // Validated before anything is bound.
    let config = Arc::new(ExporterConfig::from_args(args)?);
    init_tracing(&config.logging)?;

    let collectors = catalog.enabled(&enablement);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen,
        path = %config.telemetry_path,
        vtysh = %config.vtysh.path.display(),
        timeout = %humantime::format_duration(config.vtysh.timeout),
        collectors = ?collectors,
        "Starting FRR exporter"
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(VtyshRunner::new(
        config.vtysh.path.clone(),
        config.vtysh.timeout,
    ));
    let baseline = Arc::new(BaselineMetrics::new(env!("CARGO_PKG_VERSION")));
    let state = AppState::new(collectors, runner, config.clone(), baseline);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_server = HttpServer::new(state, config.listen);
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    tokio::select! {
        result = &mut http_task => {
            // The server only returns early when it could not start.
            return result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Err(e))) => error!("HTTP server error: {}", e),
        Ok(Err(e)) => error!("HTTP server task failed: {}", e),
        Err(_) => error!("HTTP server did not stop in time"),
        Ok(Ok(Ok(()))) => {}
    }

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
