//! Stream Log Port - Append-only Ordered Log Interface
//!
//! Any ordered, multi-reader log keyed by stream name satisfies this
//! contract (Redis Streams in production, an in-process log for tests
//! and single-binary deployments). There are no acknowledgments or
//! consumer groups: each consumer keeps its own cursor.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entry::{EntryId, FieldMap, RawEntry};
use crate::domain::error::TransportUnavailableError;

/// Handle onto the shared log.
///
/// Implementations must be safe for concurrent appends from several
/// producers; ids are assigned atomically by the log.
#[async_trait]
pub trait StreamLog: Send + Sync + 'static {
  /// Append an entry and return its newly assigned, strictly increasing id.
  ///
  /// A returned id is subsequently readable by every consumer.
  async fn append(
    &self,
    stream: &str,
    fields: &FieldMap,
  ) -> Result<EntryId, TransportUnavailableError>;

  /// Read up to `max_count` entries with ids strictly after `after`
  /// (`None` = from the beginning), in id order.
  ///
  /// Waits up to `block` for at least one entry. An elapsed wait returns
  /// an empty vector, not an error.
  async fn read(
    &self,
    stream: &str,
    after: Option<EntryId>,
    max_count: usize,
    block: Duration,
  ) -> Result<Vec<RawEntry>, TransportUnavailableError>;

  /// Id of the newest entry, `None` when the stream is empty.
  ///
  /// Used to resolve a "latest" starting position once at consumer start.
  async fn latest_id(&self, stream: &str) -> Result<Option<EntryId>, TransportUnavailableError>;
}

/// Opens independent log handles, one per consumer loop.
///
/// A blocking read on one handle never delays reads or appends on
/// another handle.
#[async_trait]
pub trait LogConnector: Send + Sync + 'static {
  /// Concrete handle type.
  type Log: StreamLog;

  /// Open a fresh handle for a new consumer.
  async fn open(&self) -> Result<Self::Log, TransportUnavailableError>;
}
