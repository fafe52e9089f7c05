//! HTTP server for the scrape endpoint and landing page.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use frr_collector_framework::{CommandRunner, EnabledCollectors};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ExporterConfig;
use crate::exporter::{BaselineMetrics, Exporter};
use crate::registry::{self, EncodeError};

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    collectors: EnabledCollectors,
    runner: Arc<dyn CommandRunner>,
    config: Arc<ExporterConfig>,
    baseline: Arc<BaselineMetrics>,
}

impl AppState {
    pub fn new(
        collectors: EnabledCollectors,
        runner: Arc<dyn CommandRunner>,
        config: Arc<ExporterConfig>,
        baseline: Arc<BaselineMetrics>,
    ) -> Self {
        Self {
            collectors,
            runner,
            config,
            baseline,
        }
    }

    fn exporter(&self) -> Exporter {
        Exporter::new(
            self.collectors.clone(),
            self.runner.clone(),
            self.config.vtysh.timeout,
            self.baseline.clone(),
        )
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let telemetry_path = state.config.telemetry_path.clone();

    Router::new()
        .route("/", get(landing_handler))
        .route(&telemetry_path, get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for the telemetry path. Always answers 200 with whatever could be encoded.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let scrape = state.exporter().scrape().await;

    let body = match scrape.registry.encode() {
        Ok(body) => body,
        Err(EncodeError { partial, source }) => {
            error!(error = %source, bytes = partial.len(), "Failed to encode metrics, serving partial output");
            partial
        }
    };

    (StatusCode::OK, [(CONTENT_TYPE, registry::CONTENT_TYPE)], body).into_response()
}

async fn landing_handler(State(state): State<AppState>) -> Html<String> {
    Html(landing_page(&state.config.telemetry_path))
}

fn landing_page(telemetry_path: &str) -> String {
    let path = escape_html(telemetry_path);
    format!(
        "<html>\n\
         <head><title>FRR Exporter</title></head>\n\
         <body>\n\
         <h1>FRR Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n"
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn ipv4_fallback(addr: SocketAddr) -> Option<SocketAddr> {
    match addr {
        SocketAddr::V6(v6) if v6.ip().is_unspecified() => {
            Some(SocketAddr::from((Ipv4Addr::UNSPECIFIED, v6.port())))
        }
        _ => None,
    }
}

/// HTTP server serving scrapes until shutdown.
pub struct HttpServer {
    state: AppState,
    listen_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(state: AppState, listen_addr: SocketAddr) -> Self {
        Self { state, listen_addr }
    }

    /// Bind the configured address and serve until the shutdown signal is received.
    ///
    /// An unspecified IPv6 address (from `:PORT`) falls back to IPv4 when the
    /// host has no IPv6 support.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = match TcpListener::bind(self.listen_addr).await {
            Ok(listener) => listener,
            Err(e) => match ipv4_fallback(self.listen_addr) {
                Some(fallback) => {
                    warn!(addr = %self.listen_addr, error = %e, fallback = %fallback, "IPv6 unavailable, listening on IPv4 only");
                    TcpListener::bind(fallback)
                        .await
                        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", fallback, e))?
                }
                None => anyhow::bail!("Failed to bind to {}: {}", self.listen_addr, e),
            },
        };

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!(
            addr = %addr,
            path = %self.state.config.telemetry_path,
            "HTTP server listening"
        );

        let router = create_router(self.state);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // Sender dropped counts as shutdown too.
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
