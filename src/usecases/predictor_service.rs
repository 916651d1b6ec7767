//! Predictor Service - Shared, Atomically Reloadable Predictor
//!
//! Holds the active `Predictor` variant behind an `ArcSwap`: every
//! `predict` call works on a snapshot, and `reload` swaps in a new
//! variant in one pointer store. In-flight predictions never observe a
//! partially loaded artifact and never wait on a lock.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, instrument, warn};

use crate::domain::error::{ArtifactError, PredictionError};
use crate::domain::features::FeatureVector;
use crate::domain::predictor::{Prediction, PredictionSource, Predictor};
use crate::ports::model_store::ModelStore;

/// Predictor shared by every consumer loop.
pub struct PredictorService {
  active: ArcSwap<Predictor>,
  store: Box<dyn ModelStore>,
}

impl PredictorService {
  /// Build the service from whatever artifact `store` currently holds.
  ///
  /// An absent artifact selects the heuristic variant. A present but
  /// unusable artifact is an error: starting in heuristic mode would hide
  /// a broken deployment.
  pub fn load(store: impl ModelStore) -> Result<Self, ArtifactError> {
    let predictor = match store.load()? {
      Some(artifact) => Predictor::Model(artifact),
      None => Predictor::Heuristic,
    };
    info!(
      location = %store.location(),
      source = predictor.source().as_str(),
      "Predictor loaded"
    );
    Ok(Self {
      active: ArcSwap::from_pointee(predictor),
      store: Box::new(store),
    })
  }

  /// Variant of the currently active predictor.
  pub fn source(&self) -> PredictionSource {
    self.active.load().source()
  }

  /// Consistent view of the active predictor.
  pub fn snapshot(&self) -> Arc<Predictor> {
    self.active.load_full()
  }

  /// Score `features` with the active variant.
  pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictionError> {
    self.active.load().predict(features)
  }

  /// Re-read the artifact and atomically swap the active variant.
  ///
  /// Present artifact ⇒ model; absent ⇒ heuristic. A corrupt artifact
  /// leaves the current variant in place and returns the error.
  #[instrument(skip(self), fields(location = %self.store.location()))]
  pub fn reload(&self) -> Result<PredictionSource, ArtifactError> {
    let next = match self.store.load() {
      Ok(Some(artifact)) => Predictor::Model(artifact),
      Ok(None) => Predictor::Heuristic,
      Err(e) => {
        warn!(error = %e, current = self.source().as_str(), "Artifact reload failed, keeping current predictor");
        return Err(e);
      }
    };

    let source = next.source();
    let previous = self.active.swap(Arc::new(next));
    info!(
      from = previous.source().as_str(),
      to = source.as_str(),
      "Predictor reloaded"
    );
    Ok(source)
  }

  /// Fingerprint of the backing artifact, for change detection.
  pub fn artifact_fingerprint(&self) -> Option<u64> {
    self.store.fingerprint()
  }
}
