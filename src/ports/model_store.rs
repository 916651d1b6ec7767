//! Model Store Port - Where the Predictor's Artifact Lives

use crate::domain::error::ArtifactError;
use crate::domain::predictor::ModelArtifact;

/// Source of the trained model artifact.
pub trait ModelStore: Send + Sync + 'static {
  /// Read and validate the artifact. `Ok(None)` when none is present.
  fn load(&self) -> Result<Option<ModelArtifact>, ArtifactError>;

  /// Cheap content fingerprint used to detect changes; `None` when absent.
  fn fingerprint(&self) -> Option<u64>;

  /// Human-readable location for logs.
  fn location(&self) -> String;
}
