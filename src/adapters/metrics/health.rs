//! Health and Metrics Server - Liveness, Readiness and Scrape Endpoints
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness flips on
//! once the role holds an authenticated session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use super::prometheus::SettlementMetrics;

/// State shared between the role and the probes.
#[derive(Clone)]
pub struct HealthState {
    /// Whether the role is past its startup (session established).
    pub ready: Arc<AtomicBool>,
    /// Metrics rendered on /metrics.
    pub metrics: Arc<SettlementMetrics>,
}

impl HealthState {
    /// New state; not ready until `mark_ready`.
    pub fn new(metrics: Arc<SettlementMetrics>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// Axum server for probes and scrapes.
pub struct HealthServer {
    state: HealthState,
    bind_address: String,
}

impl HealthServer {
    pub fn new(state: HealthState, bind_address: &str) -> Self {
        Self {
            state,
            bind_address: bind_address.to_string(),
        }
    }

    /// Router with all endpoints.
    pub fn router(state: HealthState) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(state)
    }

    /// Serve until `shutdown_rx` fires.
    ///
    /// # Errors
    /// Returns error if the address cannot be bound.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "Health and metrics server started");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always 200 while the process runs.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
        state.metrics.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_serves_probes() {
        let state = HealthState::new(Arc::new(SettlementMetrics::new().unwrap()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = HealthServer::router(state.clone());
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let base = format!("http://{addr}");
        let ready = reqwest::get(format!("{base}/ready")).await.unwrap();
        assert_eq!(ready.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        state.mark_ready();
        let ready = reqwest::get(format!("{base}/ready")).await.unwrap();
        assert_eq!(ready.status(), reqwest::StatusCode::OK);

        let live = reqwest::get(format!("{base}/live")).await.unwrap();
        assert_eq!(live.text().await.unwrap(), "OK");

        let metrics = reqwest::get(format!("{base}/metrics")).await.unwrap();
        assert!(metrics.text().await.unwrap().contains("banshield_supervisor_phase"));

        server.abort();
    }
}
