//! Model artifact file store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::domain::error::ArtifactError;
use crate::domain::predictor::ModelArtifact;
use crate::ports::model_store::ModelStore;

/// Read and validate the artifact at `path`.
///
/// A missing file is `Ok(None)` (heuristic mode), not an error.
#[instrument]
pub fn load_artifact(path: &Path) -> Result<Option<ModelArtifact>, ArtifactError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No model artifact present");
            return Ok(None);
        }
        Err(source) => {
            return Err(ArtifactError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let artifact: ModelArtifact =
        serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    artifact.validate()?;
    Ok(Some(artifact))
}

/// JSON artifact on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<ModelArtifact>, ArtifactError> {
        load_artifact(&self.path)
    }

    fn fingerprint(&self) -> Option<u64> {
        let content = std::fs::read(&self.path).ok()?;
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(hasher.finish())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
