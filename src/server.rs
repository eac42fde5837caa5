//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

/// Relay statistics shared between the loop and the HTTP server
#[derive(Debug, Default, Clone)]
pub struct RelayStats {
    pub pair_id: String,
    /// Current loop state label
    pub state: &'static str,
    pub dry_run: bool,
    /// `None` until the cursor has been resolved at startup
    pub last_scanned_block: Option<u64>,
    /// Last observed source head (after the confirmation offset)
    pub safe_head: u64,
    pub events_discovered: u64,
    pub submissions_succeeded: u64,
    pub submissions_failed: u64,
    pub consecutive_failures: u32,
}

/// Prometheus metrics, one registry per relay instance
pub struct Metrics {
    pub cycles_total: IntCounter,
    pub blocks_scanned_total: IntCounter,
    pub events_discovered_total: IntCounter,
    pub submissions_succeeded_total: IntCounter,
    /// Labelled by failing stage (nonce, gas_price, signing, submit)
    pub submissions_failed_total: IntCounterVec,
    pub range_rejections_total: IntCounter,
    pub cycle_failures_total: IntCounter,
    pub consecutive_failures: IntGauge,
    pub last_scanned_block: IntGauge,
    pub safe_head_block: IntGauge,
    pub scan_chunk_size: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let metric = IntCounter::new(name, help).expect("constant metric name is valid");
    registry
        .register(Box::new(metric.clone()))
        .expect("metric registered once per registry");
    metric
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let metric = IntGauge::new(name, help).expect("constant metric name is valid");
    registry
        .register(Box::new(metric.clone()))
        .expect("metric registered once per registry");
    metric
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let submissions_failed_total = IntCounterVec::new(
            Opts::new(
                "relayer_submissions_failed_total",
                "Relay submissions that failed, by stage",
            ),
            &["stage"],
        )
        .expect("constant metric name is valid");
        registry
            .register(Box::new(submissions_failed_total.clone()))
            .expect("metric registered once per registry");

        Self {
            cycles_total: counter(&registry, "relayer_cycles_total", "Catch-up cycles run"),
            blocks_scanned_total: counter(
                &registry,
                "relayer_blocks_scanned_total",
                "Source blocks covered by completed scans",
            ),
            events_discovered_total: counter(
                &registry,
                "relayer_events_discovered_total",
                "TokensLocked events discovered on the source chain",
            ),
            submissions_succeeded_total: counter(
                &registry,
                "relayer_submissions_succeeded_total",
                "Relay submissions signed (dry-run) or broadcast",
            ),
            submissions_failed_total,
            range_rejections_total: counter(
                &registry,
                "relayer_range_rejections_total",
                "Log queries the source node refused for their block range",
            ),
            cycle_failures_total: counter(
                &registry,
                "relayer_cycle_failures_total",
                "Cycles aborted by a node or cursor store failure",
            ),
            consecutive_failures: gauge(
                &registry,
                "relayer_consecutive_failures",
                "Consecutive failed cycles",
            ),
            last_scanned_block: gauge(
                &registry,
                "relayer_last_scanned_block",
                "Last fully scanned source block",
            ),
            safe_head_block: gauge(
                &registry,
                "relayer_safe_head_block",
                "Source head minus confirmations",
            ),
            scan_chunk_size: gauge(
                &registry,
                "relayer_scan_chunk_size",
                "Current maximum blocks per log query",
            ),
            registry,
        }
    }

    pub fn encode(&self) -> eyre::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Shared state for the HTTP server
pub type SharedStats = Arc<RwLock<RelayStats>>;
pub type SharedMetrics = Arc<Metrics>;

#[derive(Clone)]
pub struct AppState {
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub pair_id: String,
    pub state: String,
    pub dry_run: bool,
    pub last_scanned_block: Option<u64>,
    pub safe_head: u64,
    pub events_discovered: u64,
    pub submissions_succeeded: u64,
    pub submissions_failed: u64,
    pub consecutive_failures: u32,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().await;
    let status = if stats.consecutive_failures == 0 {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_string(),
        pair_id: stats.pair_id.clone(),
        state: stats.state.to_string(),
        dry_run: stats.dry_run,
        last_scanned_block: stats.last_scanned_block,
        safe_head: stats.safe_head,
        events_discovered: stats.events_discovered,
        submissions_succeeded: stats.submissions_succeeded,
        submissions_failed: stats.submissions_failed,
        consecutive_failures: stats.consecutive_failures,
    })
}

/// Liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Ready once the cursor has been resolved
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let stats = state.stats.read().await;
    if stats.last_scanned_block.is_some() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY")
    }
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let buffer = match state.metrics.encode() {
        Ok(buffer) => buffer,
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    };

    match Response::builder()
        .header(header::CONTENT_TYPE, TextEncoder::new().format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(stats: SharedStats, metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(AppState { stats, metrics })
}

/// Start the HTTP server for health and metrics
pub async fn start_server(
    bind_address: &str,
    port: u16,
    stats: SharedStats,
    metrics: SharedMetrics,
) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Health server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(stats, metrics)).await?;

    Ok(())
}
