//! Forecast Gateway Server - WebSocket Surface over Forecast Sessions
//!
//! Every upgraded connection gets a fresh log handle from the
//! `LogConnector`, a session id, and its own `ForecastSession`. Inbound
//! client messages are drained and ignored; a Close frame, a read error
//! or process shutdown flips the session's `watch` close signal.
//!
//! Process shutdown is latched into a `watch` flag subscribed when the
//! server is built, so a connection upgraded after SIGINT still sees it
//! and is closed without starting a session.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::sink::WsFrameSink;
use crate::ports::stream_log::LogConnector;
use crate::ports::telemetry::Telemetry;
use crate::usecases::forecast_session::{ForecastSession, SessionSettings};
use crate::usecases::predictor_service::PredictorService;

/// Everything a connection needs to start its session.
pub struct GatewayState<C: LogConnector> {
    connector: Arc<C>,
    predictor: Arc<PredictorService>,
    telemetry: Arc<dyn Telemetry>,
    settings: SessionSettings,
    /// Flips to `true` once the gateway is shutting down.
    stop: watch::Receiver<bool>,
}

impl<C: LogConnector> Clone for GatewayState<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            predictor: Arc::clone(&self.predictor),
            telemetry: Arc::clone(&self.telemetry),
            settings: self.settings.clone(),
            stop: self.stop.clone(),
        }
    }
}

/// Axum-based WebSocket gateway.
pub struct GatewayServer<C: LogConnector> {
    state: GatewayState<C>,
    path: String,
    stop_tx: watch::Sender<bool>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<C: LogConnector> GatewayServer<C> {
    /// `shutdown_tx` is the process-wide shutdown channel. It is
    /// subscribed here, so a signal sent before `serve` runs is not lost.
    pub fn new(
        connector: Arc<C>,
        predictor: Arc<PredictorService>,
        telemetry: Arc<dyn Telemetry>,
        settings: SessionSettings,
        path: impl Into<String>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let (stop_tx, stop) = watch::channel(false);
        Self {
            state: GatewayState {
                connector,
                predictor,
                telemetry,
                settings,
                stop,
            },
            path: path.into(),
            stop_tx,
            shutdown_rx: shutdown_tx.subscribe(),
        }
    }

    /// Close every open session and refuse sessions for new upgrades.
    pub fn stop_sessions(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.path, get(forecast_ws::<C>))
            .with_state(self.state.clone())
    }

    /// Bind `bind_address` and serve until shutdown.
    pub async fn run(self, bind_address: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_address).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip_all, fields(path = %self.path))]
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let app = self.router();
        let stop_tx = self.stop_tx;
        let mut shutdown_rx = self.shutdown_rx;

        info!(address = %listener.local_addr()?, "Forecast gateway started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                stop_tx.send_replace(true);
            })
            .await?;

        Ok(())
    }
}

async fn forecast_ws<C: LogConnector>(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState<C>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(skip_all, fields(session = tracing::field::Empty))]
async fn handle_socket<C: LogConnector>(socket: WebSocket, state: GatewayState<C>) {
    let session_id = Uuid::new_v4().to_string();
    tracing::Span::current().record("session", session_id.as_str());

    let mut stop = state.stop.clone();
    if *stop.borrow() {
        debug!("Gateway is shutting down, closing new connection");
        let _ = socket.close().await;
        return;
    }

    let log = match state.connector.open().await {
        Ok(log) => log,
        Err(e) => {
            error!(error = %e, "Could not open stream log for new connection");
            return;
        }
    };

    let (sender, mut receiver) = socket.split();
    let (close_tx, close_rx) = watch::channel(false);

    // Inbound side: nothing is expected except Close.
    let reader = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = stop.wait_for(|stopped| *stopped) => break,
                msg = receiver.next() => match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => debug!("Ignoring client message"),
                },
            }
        }
        let _ = close_tx.send(true);
    });

    let session = ForecastSession::new(
        session_id,
        log,
        WsFrameSink::new(sender),
        state.predictor,
        state.telemetry,
        state.settings,
    );
    let report = session.run(close_rx).await;
    reader.abort();

    debug!(
        reason = %report.reason,
        frames = report.frames_pushed,
        skipped = report.skipped,
        "Connection finished"
    );
}
