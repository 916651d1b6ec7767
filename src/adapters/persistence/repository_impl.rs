//! Repository Implementation - File-backed Repository Port
//!
//! Wraps `CheckpointStore` (atomic JSON cursors) and an optional
//! `TradeArchive` (JSONL trade history) behind the `Repository` trait,
//! so use cases never touch files or JSON directly.

use anyhow::Result;
use async_trait::async_trait;

use super::archive::TradeArchive;
use super::checkpoint::CheckpointStore;
use crate::domain::entry::Cursor;
use crate::domain::trade::Trade;
use crate::ports::repository::Repository;

/// Concrete repository adapter combining cursor and trade persistence.
pub struct RepositoryImpl {
    checkpoints: CheckpointStore,
    /// `None` when archiving is disabled.
    archive: Option<TradeArchive>,
}

impl RepositoryImpl {
    pub fn new(checkpoints: CheckpointStore, archive: Option<TradeArchive>) -> Self {
        Self {
            checkpoints,
            archive,
        }
    }

    /// Create the repository from configured directories.
    ///
    /// Checkpoints live in `data_dir`; the archive in `archive_dir` if set.
    pub async fn open(data_dir: &str, archive_dir: Option<&str>) -> Result<Self> {
        let checkpoints = CheckpointStore::new(data_dir).await?;
        let archive = match archive_dir {
            Some(dir) => Some(TradeArchive::new(dir).await?),
            None => None,
        };
        Ok(Self::new(checkpoints, archive))
    }
}

#[async_trait]
impl Repository for RepositoryImpl {
    async fn archive_trade(&self, trade: &Trade) -> Result<()> {
        match &self.archive {
            Some(archive) => archive.append(trade).await,
            None => Ok(()),
        }
    }

    async fn load_trades_range(&self, from_ms: u64, to_ms: u64) -> Result<Vec<Trade>> {
        let archive = self
            .archive
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("trade archive is not configured"))?;
        archive.load_range(from_ms, to_ms).await
    }

    async fn save_cursor(&self, consumer: &str, cursor: &Cursor) -> Result<()> {
        self.checkpoints.save(consumer, cursor).await
    }

    async fn load_cursor(&self, consumer: &str, stream: &str) -> Result<Option<Cursor>> {
        self.checkpoints.load(consumer, stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::EntryId;
    use crate::domain::trade::TradeSide;

    #[tokio::test]
    async fn test_without_archive() {
        let dir = tempfile::tempdir().unwrap();
        let repo = RepositoryImpl::open(dir.path().to_str().unwrap(), None)
            .await
            .unwrap();

        let trade = Trade::new(1, 1.0, 1.0, TradeSide::Buy).unwrap();
        repo.archive_trade(&trade).await.unwrap();
        assert!(repo.load_trades_range(0, 10).await.is_err());

        let cursor = Cursor::after("trades", Some(EntryId::new(9, 1)));
        repo.save_cursor("processor", &cursor).await.unwrap();
        assert_eq!(repo.load_cursor("processor", "trades").await.unwrap(), Some(cursor));
    }

    #[tokio::test]
    async fn test_with_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        let repo = RepositoryImpl::open(
            dir.path().to_str().unwrap(),
            Some(archive_dir.to_str().unwrap()),
        )
        .await
        .unwrap();

        let trade = Trade::new(5, 2.0, 0.5, TradeSide::Sell).unwrap();
        repo.archive_trade(&trade).await.unwrap();
        assert_eq!(repo.load_trades_range(0, 10).await.unwrap(), vec![trade]);
    }
}
