//! Binance WebSocket Feed - Raw Trade Message Source
//!
//! Connects to Binance's real-time `@trade` stream and forwards every
//! text frame, untouched, to the ingest use case over a bounded channel.
//! Reconnects after a fixed delay on any disconnect and stops on
//! shutdown or when the consumer side of the channel is gone.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

/// How a single connection ended without error.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Shutdown,
    ConsumerGone,
}

/// Binance trade feed via WebSocket.
pub struct BinanceTradeFeed {
    ws_url: String,
    reconnect_delay: Duration,
    messages_tx: mpsc::Sender<String>,
}

impl BinanceTradeFeed {
    /// Create a feed forwarding raw frames into `messages_tx`.
    pub fn new(ws_url: impl Into<String>, reconnect_delay: Duration, messages_tx: mpsc::Sender<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect_delay,
            messages_tx,
        }
    }

    /// Run the WebSocket connection loop.
    ///
    /// Reconnects automatically on disconnect; returns on shutdown.
    #[instrument(skip(self, shutdown_rx), fields(url = %self.ws_url))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("Connecting to Binance trade stream");

        loop {
            match self.connect_and_stream(&mut shutdown_rx).await {
                Ok(Exit::Shutdown) => {
                    info!("Binance feed shut down gracefully");
                    return Ok(());
                }
                Ok(Exit::ConsumerGone) => {
                    info!("Trade consumer gone, Binance feed stopping");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        delay_secs = self.reconnect_delay.as_secs(),
                        "Binance WebSocket disconnected, reconnecting"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => return Ok(()),
                        () = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    /// Single connection session: connect, stream, exit on error or shutdown.
    async fn connect_and_stream(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> Result<Exit> {
        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .context("Binance WebSocket connection failed")?;

        let (_write, mut read) = ws_stream.split();

        info!("Binance WebSocket connected");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received in Binance feed");
                    return Ok(Exit::Shutdown);
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.messages_tx.send(text).await.is_err() {
                                return Ok(Exit::ConsumerGone);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            // Pong is handled automatically by tungstenite
                            debug!(len = data.len(), "Binance ping received");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Err(anyhow::anyhow!("Binance closed the stream: {frame:?}"));
                        }
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("WebSocket error: {e}"));
                        }
                        None => {
                            return Err(anyhow::anyhow!("WebSocket stream ended"));
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }
}
