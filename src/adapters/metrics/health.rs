//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7. Readiness flips on
//! once the stream transport has answered at least once and drops again
//! when a consumer reports the transport lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    transport_ready: Arc<AtomicBool>,
}

impl HealthState {
    /// Not ready until the transport answers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transport_ready(&self, ready: bool) {
        self.transport_ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.transport_ready.load(Ordering::Relaxed)
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    state: HealthState,
    port: u16,
}

impl HealthServer {
    pub fn new(state: HealthState, port: u16) -> Self {
        Self { state, port }
    }

    fn router(state: HealthState) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(state)
    }

    /// Run the health server until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let app = Self::router(self.state);

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_follows_transport() {
        let state = HealthState::new();
        assert!(!state.is_ready());
        let shared = state.clone();
        shared.set_transport_ready(true);
        assert!(state.is_ready());
        shared.set_transport_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_probes_over_http() {
        let state = HealthState::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, HealthServer::router(state.clone())).into_future());

        let status = |path: &'static str| async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(format!("GET {path} HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").as_bytes())
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        };

        assert!(status("/live").await.starts_with("HTTP/1.1 200"));
        assert!(status("/ready").await.starts_with("HTTP/1.1 503"));
        state.set_transport_ready(true);
        assert!(status("/ready").await.starts_with("HTTP/1.1 200"));
    }
}
