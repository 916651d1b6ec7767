//! Replay - Archived Trades Back Into the Trade Stream
//!
//! Plain library call: reads archived trades in `[from_ms, to_ms]`
//! ordered by timestamp and appends them to a stream, optionally
//! pausing between entries to mimic live arrival.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::domain::entry::EntryPayload;
use crate::ports::repository::Repository;
use crate::ports::stream_log::StreamLog;

/// Replay archived trades. Returns the number of entries appended.
#[instrument(skip(archive, log))]
pub async fn replay<L: StreamLog>(
  archive: &dyn Repository,
  log: &L,
  stream: &str,
  from_ms: u64,
  to_ms: u64,
  delay: Duration,
) -> Result<usize> {
  let trades = archive
    .load_trades_range(from_ms, to_ms)
    .await
    .context("Failed to load archived trades")?;

  for (i, trade) in trades.iter().enumerate() {
    if i > 0 && !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    log
      .append(stream, &EntryPayload::Trade(*trade).to_fields())
      .await
      .context("Failed to append replayed trade")?;
  }

  info!(count = trades.len(), "Replay complete");
  Ok(trades.len())
}
