//! Trade Archive - Append-only JSONL Trade History
//!
//! Keeps every normalized trade in daily JSONL files named
//! `YYYY-MM-DD.jsonl` (UTC date of the trade). One self-contained JSON
//! record per line; the archive is the input of `replay`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::DateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::trade::Trade;

/// Append-only JSONL trade archive with daily file rotation.
pub struct TradeArchive {
    dir: PathBuf,
}

impl TradeArchive {
    /// Open (creating if needed) the archive directory.
    pub async fn new(dir: &str) -> Result<Self> {
        let dir = PathBuf::from(dir);
        fs::create_dir_all(&dir)
            .await
            .context("Failed to create trade archive directory")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, trade: &Trade) -> PathBuf {
        let date = i64::try_from(trade.ts)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map_or_else(|| "undated".to_string(), |dt| dt.format("%Y-%m-%d").to_string());
        self.dir.join(format!("{date}.jsonl"))
    }

    /// Append one trade to the file for its day.
    #[instrument(skip(self, trade), fields(ts = trade.ts))]
    pub async fn append(&self, trade: &Trade) -> Result<()> {
        let mut json = serde_json::to_string(trade).context("Failed to serialize trade")?;
        json.push('\n');

        let path = self.file_for(trade);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open trade archive file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write trade record")?;
        file.flush().await.context("Failed to flush trade archive")?;

        Ok(())
    }

    /// Load trades with `from_ms <= ts <= to_ms`, ordered by timestamp.
    ///
    /// Malformed lines are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn load_range(&self, from_ms: u64, to_ms: u64) -> Result<Vec<Trade>> {
        let mut trades = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "jsonl") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match parse_line(line) {
                    Ok(trade) if (from_ms..=to_ms).contains(&trade.ts) => trades.push(trade),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed archived trade"
                        );
                    }
                }
            }
        }

        // Stable: trades sharing a timestamp keep their file order
        trades.sort_by_key(|t| t.ts);
        info!(count = trades.len(), "Loaded archived trades");
        Ok(trades)
    }
}

/// Decode one archived line, re-applying the `Trade` invariants.
fn parse_line(line: &str) -> Result<Trade> {
    let raw: Trade = serde_json::from_str(line)?;
    Ok(Trade::new(raw.ts, raw.price, raw.qty, raw.side)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::TradeSide;

    #[tokio::test]
    async fn test_append_and_load_range() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TradeArchive::new(dir.path().to_str().unwrap()).await.unwrap();

        // Two different UTC days
        let day = 86_400_000;
        let t1 = Trade::new(1_700_000_000_000, 100.0, 1.0, TradeSide::Buy).unwrap();
        let t2 = Trade::new(1_700_000_000_000 + day, 101.0, 2.0, TradeSide::Sell).unwrap();
        let t3 = Trade::new(1_700_000_000_500, 102.0, 0.5, TradeSide::Sell).unwrap();
        archive.append(&t2).await.unwrap();
        archive.append(&t1).await.unwrap();
        archive.append(&t3).await.unwrap();

        let all = archive.load_range(0, u64::MAX).await.unwrap();
        assert_eq!(all, vec![t1, t3, t2]);

        let window = archive
            .load_range(1_700_000_000_000, 1_700_000_000_500)
            .await
            .unwrap();
        assert_eq!(window, vec![t1, t3]);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TradeArchive::new(dir.path().to_str().unwrap()).await.unwrap();
        let trade = Trade::new(10, 1.0, 1.0, TradeSide::Buy).unwrap();
        archive.append(&trade).await.unwrap();
        std::fs::write(dir.path().join("junk.jsonl"), "not json\n\n").unwrap();

        assert_eq!(archive.load_range(0, 100).await.unwrap(), vec![trade]);
    }

    #[tokio::test]
    async fn test_invalid_archived_trades_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TradeArchive::new(dir.path().to_str().unwrap()).await.unwrap();
        let trade = Trade::new(20, 5.0, 0.0, TradeSide::Sell).unwrap();
        archive.append(&trade).await.unwrap();
        std::fs::write(
            dir.path().join("edited.jsonl"),
            concat!(
                r#"{"ts":11,"price":-3.0,"qty":1.0,"side":"buy"}"#,
                "\n",
                r#"{"ts":12,"price":0.0,"qty":1.0,"side":"buy"}"#,
                "\n",
                r#"{"ts":13,"price":2.0,"qty":-1.0,"side":"sell"}"#,
                "\n",
            ),
        )
        .unwrap();

        assert_eq!(archive.load_range(0, 100).await.unwrap(), vec![trade]);
    }
}
