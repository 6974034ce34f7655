//! Prometheus metrics exposition
//!
//! Counters emitted by the library crates:
//!
//! - `pool_attempts_total` (counter): label `outcome` (success or error kind)
//! - `pool_backoffs_total` (counter): full rotations that ended in a backoff sleep
//! - `fetcher_windows_total` (counter): search windows requested
//! - `normalizer_rejections_total` (counter): label `reason`
//! - `index_requests_total` (counter): label `outcome`
//!
//! Served on `/metrics` next to a `/health` pool summary, only when
//! `[metrics] listen_addr` is configured.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use credential_pool::CredentialPool;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;

fn describe() {
    metrics::describe_counter!("pool_attempts_total", "Credential pool call attempts by outcome");
    metrics::describe_counter!("pool_backoffs_total", "Backoff sleeps after a full failed rotation");
    metrics::describe_counter!("fetcher_windows_total", "Search windows requested");
    metrics::describe_counter!("normalizer_rejections_total", "Raw records dropped during normalization");
    metrics::describe_counter!("index_requests_total", "Search index requests by outcome");
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    describe();
    Ok(handle)
}

/// Shared state for the metrics listener
pub struct MetricsState<C> {
    pub prometheus: PrometheusHandle,
    /// Absent for commands that never touch the API
    pub pool: Option<Arc<CredentialPool<C>>>,
}

impl<C> Clone for MetricsState<C> {
    fn clone(&self) -> Self {
        Self {
            prometheus: self.prometheus.clone(),
            pool: self.pool.clone(),
        }
    }
}

pub fn build_router<C: Send + Sync + 'static>(state: MetricsState<C>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<C>))
        .route("/metrics", get(metrics_handler::<C>))
        .with_state(state)
}

/// Serve the metrics router on `addr` until `shutdown` resolves.
pub async fn serve<C, F>(addr: SocketAddr, state: MetricsState<C>, shutdown: F) -> Result<()>
where
    C: Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener to {addr}"))?;
    info!(addr = %addr, "metrics listener ready");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("metrics listener failed")
}

/// 200 with the pool summary, 503 once no credential is usable.
async fn health_handler<C: Send + Sync + 'static>(State(state): State<MetricsState<C>>) -> impl IntoResponse {
    let (status_code, body) = match &state.pool {
        Some(pool) => {
            let summary = pool.summary();
            let code = if summary["status"] == "unhealthy" {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            (code, summary)
        }
        None => (StatusCode::OK, serde_json::json!({ "status": "healthy", "pool": "not_loaded" })),
    };

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn metrics_handler<C: Send + Sync + 'static>(State(state): State<MetricsState<C>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
