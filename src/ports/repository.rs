//! Repository Port - Cursor Checkpoints and Trade History
//!
//! Defines the persistence the pipeline needs outside the stream log:
//! crash-safe consumer cursors and the append-only trade archive that
//! replay reads from.

use async_trait::async_trait;

use crate::domain::entry::Cursor;
use crate::domain::trade::Trade;

/// Durable storage for consumer positions and archived trades.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
  /// Append one normalized trade to the archive.
  async fn archive_trade(&self, trade: &Trade) -> anyhow::Result<()>;

  /// Archived trades with `from_ms <= ts <= to_ms`, ordered by timestamp.
  async fn load_trades_range(&self, from_ms: u64, to_ms: u64) -> anyhow::Result<Vec<Trade>>;

  /// Persist `consumer`'s cursor atomically.
  async fn save_cursor(&self, consumer: &str, cursor: &Cursor) -> anyhow::Result<()>;

  /// Last persisted cursor of `consumer` over `stream`, if any.
  async fn load_cursor(&self, consumer: &str, stream: &str) -> anyhow::Result<Option<Cursor>>;
}
