//! Trade Ingest - Exchange Messages → Trade Stream
//!
//! Receives raw exchange trade messages (JSON text) from a feed adapter,
//! normalizes them and appends each trade to the trade stream. When an
//! archive is configured every appended trade is also written to it.
//! Malformed messages are dropped with a warning; losing the transport
//! stops ingest.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::entry::{EntryId, EntryPayload};
use crate::domain::error::TransportUnavailableError;
use crate::domain::trade::{normalize, RawTradeEvent};
use crate::ports::repository::Repository;
use crate::ports::stream_log::StreamLog;
use crate::ports::telemetry::Telemetry;

const CONSUMER: &str = "ingest";

/// Normalizes and appends exchange trades.
pub struct TradeIngestor<L: StreamLog> {
  log: L,
  stream: String,
  archive: Option<Arc<dyn Repository>>,
  telemetry: Arc<dyn Telemetry>,
}

impl<L: StreamLog> TradeIngestor<L> {
  pub fn new(
    log: L,
    stream: impl Into<String>,
    archive: Option<Arc<dyn Repository>>,
    telemetry: Arc<dyn Telemetry>,
  ) -> Self {
    Self {
      log,
      stream: stream.into(),
      archive,
      telemetry,
    }
  }

  /// Handle one raw message. `Ok(None)` when it was dropped as malformed.
  pub async fn ingest_message(&self, text: &str) -> Result<Option<EntryId>, TransportUnavailableError> {
    let trade = match RawTradeEvent::from_json(text).and_then(|raw| normalize(&raw)) {
      Ok(trade) => trade,
      Err(e) => {
        warn!(error = %e, "Dropping malformed exchange message");
        self.telemetry.malformed_event(CONSUMER);
        return Ok(None);
      }
    };

    let id = self
      .log
      .append(&self.stream, &EntryPayload::Trade(trade).to_fields())
      .await?;
    self.telemetry.trade_ingested();
    debug!(%id, ts = trade.ts, price = trade.price, side = %trade.side, "Trade appended");

    if let Some(archive) = &self.archive {
      if let Err(e) = archive.archive_trade(&trade).await {
        warn!(error = %e, "Failed to archive trade");
      }
    }
    Ok(Some(id))
  }

  /// Consume messages until the feed closes, shutdown, or transport loss.
  #[instrument(skip_all, fields(stream = %self.stream))]
  pub async fn run(
    self,
    mut messages: mpsc::Receiver<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> Result<()> {
    info!("Trade ingest started");
    loop {
      let text = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Trade ingest shutting down");
          return Ok(());
        }
        msg = messages.recv() => match msg {
          Some(text) => text,
          None => {
            info!("Trade feed closed, ingest stopping");
            return Ok(());
          }
        },
      };

      if let Err(e) = self.ingest_message(&text).await {
        error!(error = %e, "Trade ingest lost the stream transport");
        return Err(e).context("Trade ingest stopped");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::stream::InMemoryStreamLog;
  use crate::domain::entry::StreamEntry;
  use crate::domain::trade::{Trade, TradeSide};
  use crate::ports::telemetry::NoopTelemetry;

  #[tokio::test]
  async fn test_normalizes_and_appends() {
    let log = InMemoryStreamLog::new();
    let ingestor = TradeIngestor::new(log.clone(), "trades", None, Arc::new(NoopTelemetry));

    let id = ingestor
      .ingest_message(r#"{"e":"trade","T":1700000000000,"p":"64000.42","q":"0.012","m":false}"#)
      .await
      .unwrap()
      .unwrap();

    let entries = log
      .read("trades", None, 10, std::time::Duration::from_millis(10))
      .await
      .unwrap();
    let entry = StreamEntry::try_from(&entries[0]).unwrap();
    assert_eq!(entry.id, id);
    assert_eq!(
      *entry.payload.trade(),
      Trade::new(1_700_000_000_000, 64000.42, 0.012, TradeSide::Buy).unwrap()
    );
  }

  #[tokio::test]
  async fn test_malformed_dropped() {
    let log = InMemoryStreamLog::new();
    let ingestor = TradeIngestor::new(log.clone(), "trades", None, Arc::new(NoopTelemetry));

    assert_eq!(ingestor.ingest_message("not json").await.unwrap(), None);
    assert_eq!(
      ingestor
        .ingest_message(r#"{"p":"1.0","q":"1.0","m":true}"#)
        .await
        .unwrap(),
      None
    );
    assert_eq!(log.len("trades"), 0);
  }

  #[tokio::test]
  async fn test_run_stops_when_feed_closes() {
    let log = InMemoryStreamLog::new();
    let ingestor = TradeIngestor::new(log.clone(), "trades", None, Arc::new(NoopTelemetry));
    let (tx, rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tx.send(r#"{"T":1,"p":"2","q":"3","m":true}"#.to_string()).await.unwrap();
    drop(tx);
    ingestor.run(rx, shutdown_rx).await.unwrap();
    assert_eq!(log.len("trades"), 1);
  }
}
