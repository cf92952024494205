//! HTTP exposition of the collectors.

use crate::collectors::config::CollectorConfig;
use crate::collectors::registry::CollectorRegistry;
use anyhow::{Context, Result, anyhow, bail};
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};
use ulid::Ulid;

/// Sent by Prometheus with every scrape.
pub const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

#[derive(Clone)]
pub struct AppState {
    pool: MySqlPool,
    registry: CollectorRegistry,
    config: Arc<CollectorConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: MySqlPool, config: CollectorConfig) -> Self {
        Self {
            pool,
            registry: CollectorRegistry::new(&config),
            config: Arc::new(config),
        }
    }
}

#[derive(Clone, Copy, Default)]
struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Ulid::new().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Start the exporter and serve until SIGINT/SIGTERM.
///
/// The database pool connects lazily, so the exporter starts (and reports
/// `mysql_up 0`) while the server is unreachable.
///
/// # Errors
///
/// Returns an error if the DSN or listen address is invalid, or the socket
/// cannot be bound.
#[allow(clippy::needless_pass_by_value)]
pub async fn new(
    port: u16,
    listen: Option<String>,
    dsn: SecretString,
    collectors: Vec<String>,
    timeout_offset: Duration,
) -> Result<()> {
    let options = connect_options(&dsn)?;

    let pool = MySqlPoolOptions::new()
        .max_connections(4)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy_with(options);

    let config = CollectorConfig::new()
        .with_enabled(&collectors)
        .with_timeout_offset(timeout_offset);

    let app = router(AppState::new(pool.clone(), config));

    let listener = bind(listen.as_deref(), port).await?;
    info!(addr = %listener.local_addr()?, version = %crate::version(), "mysqld_exporter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("server shut down gracefully");

    Ok(())
}

/// Build the routes.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUlid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    info_span!(
                        "http.request",
                        http.method = %request.method(),
                        http.target = %request.uri(),
                        request_id,
                        otel.kind = "server"
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

fn connect_options(dsn: &SecretString) -> Result<MySqlConnectOptions> {
    let raw = dsn.expose_secret();

    if !(raw.starts_with("mysql://") || raw.starts_with("mariadb://")) {
        bail!("DSN must start with mysql:// or mariadb://");
    }

    // The sqlx error would echo the DSN, password included.
    MySqlConnectOptions::from_str(raw).map_err(|_| anyhow!("invalid DSN"))
}

async fn bind(listen: Option<&str>, port: u16) -> Result<TcpListener> {
    if let Some(listen) = listen {
        let ip: IpAddr = listen
            .trim_matches(|c| c == '[' || c == ']')
            .parse()
            .with_context(|| format!("invalid listen address {listen}"))?;

        return TcpListener::bind(SocketAddr::new(ip, port))
            .await
            .with_context(|| format!("failed to bind {ip}:{port}"));
    }

    match TcpListener::bind(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            warn!(error = %e, "could not bind [::], falling back to 0.0.0.0");
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
                .await
                .with_context(|| format!("failed to bind 0.0.0.0:{port}"))
        }
    }
}

async fn root() -> Html<String> {
    Html(format!(
        "<html><head><title>MySQLd Exporter</title></head><body>\
         <h1>MySQLd Exporter</h1><p>{}</p>\
         <p><a href=\"/metrics\">Metrics</a></p>\
         <p><a href=\"/health\">Health</a></p>\
         </body></html>",
        crate::version()
    ))
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let scrape_timeout = headers
        .get(SCRAPE_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok());
    let deadline = state.config.scrape_deadline(scrape_timeout);

    match state.registry.collect_all(&state.pool, deadline).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Resolve on SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        () = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}
