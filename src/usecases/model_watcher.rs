//! Model Watcher - Poll the Model Artifact and Hot-Reload the Predictor
//!
//! Periodically fingerprints the artifact and calls
//! `PredictorService::reload` whenever it appears, changes or
//! disappears. Polling rather than a filesystem watcher keeps the
//! behavior identical across Linux, macOS and Docker volumes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::predictor_service::PredictorService;
use crate::domain::predictor::PredictionSource;
use crate::ports::telemetry::Telemetry;

/// Watches the model artifact and swaps the predictor on change.
pub struct ModelWatcher {
  service: Arc<PredictorService>,
  telemetry: Arc<dyn Telemetry>,
  interval: Duration,
  /// Fingerprint of the artifact the active predictor was built from.
  last_fingerprint: Option<u64>,
}

impl ModelWatcher {
  pub fn new(
    service: Arc<PredictorService>,
    telemetry: Arc<dyn Telemetry>,
    interval: Duration,
  ) -> Self {
    let last_fingerprint = service.artifact_fingerprint();
    Self {
      service,
      telemetry,
      interval,
      last_fingerprint,
    }
  }

  /// Poll until shutdown.
  #[instrument(skip(self, shutdown_rx))]
  pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
    info!(interval_secs = self.interval.as_secs(), "Model watcher started");

    loop {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Model watcher shutting down");
          return;
        }
        () = tokio::time::sleep(self.interval) => {
          // Fingerprint and load read the file; keep that off the runtime workers.
          let service = Arc::clone(&self.service);
          let last = self.last_fingerprint;
          match tokio::task::spawn_blocking(move || poll_artifact(&service, last)).await {
            Ok(outcome) => {
              self.apply(outcome);
            }
            Err(e) => warn!(error = %e, "Model artifact poll task failed"),
          }
        }
      }
    }
  }

  /// Reload when the artifact changed. Returns true if a reload succeeded.
  ///
  /// Blocking: reads the artifact file on the calling thread.
  pub fn check_and_reload(&mut self) -> bool {
    let outcome = poll_artifact(&self.service, self.last_fingerprint);
    self.apply(outcome)
  }

  fn apply(&mut self, outcome: PollOutcome) -> bool {
    match outcome {
      PollOutcome::Reloaded { fingerprint, source } => {
        self.last_fingerprint = fingerprint;
        self.telemetry.predictor_active(source);
        true
      }
      // A failed reload is retried on the next tick
      PollOutcome::Unchanged | PollOutcome::Failed => false,
    }
  }
}

/// Result of one artifact poll.
#[derive(Debug)]
enum PollOutcome {
  Unchanged,
  Reloaded {
    fingerprint: Option<u64>,
    source: PredictionSource,
  },
  Failed,
}

fn poll_artifact(service: &PredictorService, last: Option<u64>) -> PollOutcome {
  let fingerprint = service.artifact_fingerprint();
  if fingerprint == last {
    debug!("Model artifact unchanged");
    return PollOutcome::Unchanged;
  }

  info!("Model artifact change detected, reloading...");
  match service.reload() {
    Ok(source) => PollOutcome::Reloaded { fingerprint, source },
    Err(e) => {
      warn!(error = %e, "Failed to reload model artifact");
      PollOutcome::Failed
    }
  }
}
