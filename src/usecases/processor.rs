//! Feature Processor - Trade Stream → OFI → Feature Stream
//!
//! A single batch consumer with its own cursor and its own sliding
//! window. For every trade it appends a feature record
//! `{ts, price, qty, side, ofi}` to the feature stream and only then
//! advances its cursor. The cursor is checkpointed through the
//! `Repository` port every `checkpoint_every` entries and on shutdown,
//! so a restart resumes after the last checkpoint (at-least-once for the
//! entries in between).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::entry::{
  Cursor, EntryPayload, FeatureRecord, RawEntry, StartFrom, StreamEntry,
};
use crate::domain::error::TransportUnavailableError;
use crate::domain::ofi::OfiWindow;
use crate::ports::repository::Repository;
use crate::ports::stream_log::StreamLog;
use crate::ports::telemetry::Telemetry;

/// Checkpoint name of the processor's cursor.
pub const CONSUMER: &str = "processor";

/// Static parameters of the processor.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
  pub trade_stream: String,
  pub feature_stream: String,
  /// Starting point when no checkpoint exists.
  pub start_from: StartFrom,
  pub batch_size: usize,
  pub block: Duration,
  pub window_size: usize,
  /// Entries between checkpoints; 0 = only on shutdown.
  pub checkpoint_every: u64,
}

/// Batch consumer deriving OFI features from the trade stream.
pub struct FeatureProcessor<L: StreamLog> {
  log: L,
  repo: Option<Arc<dyn Repository>>,
  telemetry: Arc<dyn Telemetry>,
  settings: ProcessorSettings,
  window: OfiWindow,
  cursor: Cursor,
  since_checkpoint: u64,
}

impl<L: StreamLog> FeatureProcessor<L> {
  /// Resolve the starting cursor: checkpoint first, else `start_from`.
  #[instrument(skip_all, fields(stream = %settings.trade_stream))]
  pub async fn start(
    log: L,
    repo: Option<Arc<dyn Repository>>,
    telemetry: Arc<dyn Telemetry>,
    settings: ProcessorSettings,
  ) -> Result<Self> {
    let saved = match &repo {
      Some(repo) => repo
        .load_cursor(CONSUMER, &settings.trade_stream)
        .await
        .context("Failed to load processor checkpoint")?,
      None => None,
    };

    let cursor = match (saved, settings.start_from) {
      (Some(cursor), _) => cursor,
      (None, StartFrom::Beginning) => Cursor::beginning(settings.trade_stream.clone()),
      (None, StartFrom::Latest) => {
        let latest = log
          .latest_id(&settings.trade_stream)
          .await
          .context("Failed to resolve latest trade id")?;
        Cursor::after(settings.trade_stream.clone(), latest)
      }
    };

    info!(start = ?cursor.last(), "Feature processor starting");
    Ok(Self {
      log,
      repo,
      telemetry,
      window: OfiWindow::new(settings.window_size),
      settings,
      cursor,
      since_checkpoint: 0,
    })
  }

  pub fn cursor(&self) -> &Cursor {
    &self.cursor
  }

  pub fn window(&self) -> &OfiWindow {
    &self.window
  }

  /// Consume until shutdown or transport loss. Returns the final cursor.
  #[instrument(skip_all, fields(stream = %self.settings.trade_stream))]
  pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<Cursor> {
    loop {
      let read = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Feature processor shutting down");
          break;
        }
        res = self.log.read(
          &self.settings.trade_stream,
          self.cursor.last(),
          self.settings.batch_size,
          self.settings.block,
        ) => res,
      };

      let outcome = match read {
        Ok(entries) => self.handle_batch(&entries).await,
        Err(e) => Err(e),
      };
      if let Err(e) = outcome {
        error!(error = %e, "Feature processor lost the stream transport");
        self.checkpoint().await;
        return Err(e).context("Feature processor stopped");
      }
    }

    self.checkpoint().await;
    Ok(self.cursor)
  }

  /// Process one batch in id order. Returns the number of entries consumed.
  pub async fn handle_batch(&mut self, entries: &[RawEntry]) -> Result<usize, TransportUnavailableError> {
    let mut consumed = 0;
    for raw in entries {
      if self.cursor.last().is_some_and(|last| raw.id <= last) {
        debug!(id = %raw.id, "Ignoring entry at or before the cursor");
        continue;
      }
      self.handle_entry(raw).await?;
      consumed += 1;

      self.since_checkpoint += 1;
      if self.settings.checkpoint_every > 0 && self.since_checkpoint >= self.settings.checkpoint_every {
        self.checkpoint().await;
      }
    }
    Ok(consumed)
  }

  async fn handle_entry(&mut self, raw: &RawEntry) -> Result<(), TransportUnavailableError> {
    match StreamEntry::try_from(raw) {
      Ok(entry) => {
        let trade = *entry.payload.trade();
        let ofi = self.window.observe(trade.side);
        let record = EntryPayload::Feature(FeatureRecord { trade, ofi });
        self
          .log
          .append(&self.settings.feature_stream, &record.to_fields())
          .await?;
        self.telemetry.feature_emitted();
      }
      Err(e) => {
        warn!(id = %raw.id, error = %e, "Skipping malformed trade entry");
        self.telemetry.malformed_event(CONSUMER);
      }
    }
    self.cursor.advance(raw.id);
    Ok(())
  }

  async fn checkpoint(&mut self) {
    let Some(repo) = &self.repo else {
      return;
    };
    match repo.save_cursor(CONSUMER, &self.cursor).await {
      Ok(()) => self.since_checkpoint = 0,
      Err(e) => warn!(error = %e, "Failed to checkpoint processor cursor"),
    }
  }
}
