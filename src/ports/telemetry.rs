//! Telemetry Port - Pipeline Counters
//!
//! Use cases report what happened through this trait; the Prometheus
//! adapter implements it in production. Every hook defaults to a no-op.

use std::time::Duration;

use crate::domain::predictor::PredictionSource;

#[allow(unused_variables)]
pub trait Telemetry: Send + Sync + 'static {
  /// A frame reached its client.
  fn frame_pushed(&self, source: PredictionSource, latency: Duration) {}

  /// `consumer` skipped an event it could not parse.
  fn malformed_event(&self, consumer: &'static str) {}

  /// A model prediction failed and the heuristic answered instead.
  fn prediction_fallback(&self) {}

  fn session_opened(&self) {}

  fn session_closed(&self) {}

  fn trade_ingested(&self) {}

  fn feature_emitted(&self) {}

  /// The active predictor variant changed (or was loaded).
  fn predictor_active(&self, source: PredictionSource) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}
