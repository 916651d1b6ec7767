//! Cursor Checkpoint Store - Atomic JSON Cursor Persistence
//!
//! Saves each consumer's cursor to `<consumer>.cursor.json` using atomic
//! writes (write to tmp file, then rename) so a crash leaves either the
//! old or the new position on disk, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::domain::entry::{Cursor, EntryId};

/// On-disk checkpoint record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorCheckpoint {
    pub stream: String,
    /// Last fully processed id, as `ms-seq`.
    pub last: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Atomic JSON store for consumer cursors.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store inside `data_dir`, creating the directory if needed.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create checkpoint directory")?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, consumer: &str) -> PathBuf {
        self.dir.join(format!("{consumer}.cursor.json"))
    }

    /// Persist `cursor` atomically (tmp → rename).
    #[instrument(skip(self, cursor), fields(stream = cursor.stream()))]
    pub async fn save(&self, consumer: &str, cursor: &Cursor) -> Result<()> {
        let record = CursorCheckpoint {
            stream: cursor.stream().to_string(),
            last: cursor.last().map(|id| id.to_string()),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&record)
            .context("Failed to serialize cursor checkpoint")?;

        let path = self.path_for(consumer);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, &json)
            .await
            .context("Failed to write tmp checkpoint file")?;
        fs::rename(&tmp_path, &path)
            .await
            .context("Failed to rename checkpoint file")?;

        debug!(last = ?record.last, "Cursor checkpoint saved");
        Ok(())
    }

    /// Load `consumer`'s persisted cursor over `stream`.
    ///
    /// Returns `None` on first startup, or when the checkpoint belongs to a
    /// different stream (the configured source changed).
    #[instrument(skip(self))]
    pub async fn load(&self, consumer: &str, stream: &str) -> Result<Option<Cursor>> {
        let path = self.path_for(consumer);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            info!("No cursor checkpoint found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .await
            .context("Failed to read checkpoint file")?;
        let record: CursorCheckpoint =
            serde_json::from_str(&json).context("Failed to parse checkpoint JSON")?;

        if record.stream != stream {
            warn!(
                saved = %record.stream,
                configured = stream,
                "Checkpoint is for a different stream, ignoring"
            );
            return Ok(None);
        }

        let last = record
            .last
            .as_deref()
            .map(str::parse::<EntryId>)
            .transpose()
            .context("Checkpoint holds an invalid entry id")?;

        info!(last = ?record.last, saved_at = %record.saved_at, "Cursor checkpoint loaded");
        Ok(Some(Cursor::after(stream, last)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().to_str().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(store.load("processor", "trades").await.unwrap().is_none());

        let mut cursor = Cursor::beginning("trades");
        cursor.advance(EntryId::new(1_700_000_000_000, 3));
        tokio_test::assert_ok!(store.save("processor", &cursor).await);

        let loaded = store.load("processor", "trades").await.unwrap().unwrap();
        assert_eq!(loaded, cursor);
        assert!(!store.path_for("processor").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_consumers_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store
            .save("a", &Cursor::after("trades", Some(EntryId::new(5, 0))))
            .await
            .unwrap();

        assert!(store.load("b", "trades").await.unwrap().is_none());
        assert!(store.load("a", "features").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        std::fs::write(store.path_for("processor"), "{not json").unwrap();

        tokio_test::assert_err!(store.load("processor", "trades").await);
    }
}
