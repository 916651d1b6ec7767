//! Frame Sink Port - Per-connection Forecast Push Interface
//!
//! Abstracts the client-facing channel so forecast sessions can be
//! driven by a WebSocket in production and by plain collectors in tests.

use async_trait::async_trait;

use crate::domain::error::ClientDisconnected;

/// Ordered push channel to exactly one client.
#[async_trait]
pub trait FrameSink: Send + 'static {
  /// Deliver one serialized forecast frame.
  ///
  /// Returns `ClientDisconnected` when the client is gone; the frame
  /// is then considered not delivered.
  async fn push(&mut self, frame: String) -> Result<(), ClientDisconnected>;
}
