//! In-process Stream Log - Redis-compatible Append-only Log in Memory
//!
//! Assigns `<ms>-<seq>` ids the way Redis Streams do (wall-clock
//! milliseconds, sequence bumped on collisions or clock steps backwards)
//! and wakes blocked readers through a `tokio::sync::Notify`. Used for
//! single-process deployments and as the transport in tests.
//!
//! Entries live only in memory. `new()` keeps every entry forever; a
//! long-running deployment should use `with_max_len`, which trims the
//! oldest entries of a stream on append (like Redis `XADD MAXLEN`).
//! A consumer whose cursor points into trimmed history simply resumes at
//! the oldest retained entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::domain::entry::{EntryId, FieldMap, RawEntry};
use crate::domain::error::TransportUnavailableError;
use crate::ports::stream_log::{LogConnector, StreamLog};

#[derive(Debug, Default)]
struct Inner {
    streams: Mutex<HashMap<String, Vec<RawEntry>>>,
    appended: Notify,
    /// Per-stream retention cap; `None` = unbounded.
    max_len: Option<usize>,
}

/// Shared in-memory log. Cloning yields another handle onto the same log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStreamLog {
    inner: Arc<Inner>,
}

impl InMemoryStreamLog {
    /// Unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log retaining at most `max_len` entries per stream (0 = unbounded).
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_len: (max_len > 0).then_some(max_len),
                ..Inner::default()
            }),
        }
    }

    fn streams(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<RawEntry>>>, TransportUnavailableError> {
        self.inner
            .streams
            .lock()
            .map_err(|e| TransportUnavailableError(format!("in-memory log poisoned: {e}")))
    }

    /// Number of entries currently in `stream`.
    pub fn len(&self, stream: &str) -> usize {
        self.streams()
            .map(|streams| streams.get(stream).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Entries strictly after `after`, at most `max_count`.
    fn collect(
        &self,
        stream: &str,
        after: Option<EntryId>,
        max_count: usize,
    ) -> Result<Vec<RawEntry>, TransportUnavailableError> {
        let streams = self.streams()?;
        let Some(entries) = streams.get(stream) else {
            return Ok(Vec::new());
        };
        let start = after.map_or(0, |after| entries.partition_point(|e| e.id <= after));
        Ok(entries[start..].iter().take(max_count).cloned().collect())
    }
}

fn next_id(last: Option<EntryId>) -> EntryId {
    let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    match last {
        Some(last) if now_ms <= last.ms => EntryId::new(last.ms, last.seq + 1),
        _ => EntryId::new(now_ms, 0),
    }
}

#[async_trait]
impl StreamLog for InMemoryStreamLog {
    async fn append(
        &self,
        stream: &str,
        fields: &FieldMap,
    ) -> Result<EntryId, TransportUnavailableError> {
        let id = {
            let mut streams = self.streams()?;
            let entries = streams.entry(stream.to_string()).or_default();
            let id = next_id(entries.last().map(|e| e.id));
            entries.push(RawEntry {
                id,
                fields: fields.clone(),
            });
            if let Some(max_len) = self.inner.max_len {
                let excess = entries.len().saturating_sub(max_len);
                entries.drain(..excess);
            }
            id
        };
        self.inner.appended.notify_waiters();
        Ok(id)
    }

    async fn read(
        &self,
        stream: &str,
        after: Option<EntryId>,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<RawEntry>, TransportUnavailableError> {
        let max_count = max_count.max(1);
        let deadline = Instant::now() + block;

        loop {
            // Register interest before checking so an append between the
            // check and the wait is not missed.
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.collect(stream, after, max_count)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn latest_id(&self, stream: &str) -> Result<Option<EntryId>, TransportUnavailableError> {
        Ok(self
            .streams()?
            .get(stream)
            .and_then(|entries| entries.last())
            .map(|e| e.id))
    }
}

#[async_trait]
impl LogConnector for InMemoryStreamLog {
    type Log = Self;

    async fn open(&self) -> Result<Self::Log, TransportUnavailableError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(n: u64) -> FieldMap {
        let mut f = FieldMap::new();
        f.insert("n".to_string(), n.to_string());
        f
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let log = InMemoryStreamLog::new();
        let mut last = None;
        for n in 0..50 {
            let id = log.append("s", &fields(n)).await.unwrap();
            assert!(last.is_none_or(|l| id > l));
            last = Some(id);
        }
        assert_eq!(log.len("s"), 50);
        assert_eq!(log.latest_id("s").await.unwrap(), last);
    }

    #[tokio::test]
    async fn test_read_after_cursor_in_order() {
        let log = InMemoryStreamLog::new();
        let ids: Vec<_> = futures_util::future::join_all((0..5).map(|n| {
            let log = log.clone();
            async move { log.append("s", &fields(n)).await.unwrap() }
        }))
        .await;
        let mut sorted = ids.clone();
        sorted.sort();

        let first = log.read("s", None, 2, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.iter().map(|e| e.id).collect::<Vec<_>>(), sorted[..2]);

        let rest = log
            .read("s", Some(sorted[1]), 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(rest.iter().map(|e| e.id).collect::<Vec<_>>(), sorted[2..]);
    }

    #[tokio::test]
    async fn test_max_len_trims_oldest_entries() {
        let log = InMemoryStreamLog::with_max_len(3);
        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(log.append("s", &fields(n)).await.unwrap());
        }
        assert_eq!(log.len("s"), 3);

        let all = log.read("s", None, 10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), ids[2..]);

        // A cursor on a trimmed id resumes at the oldest retained entry.
        let rest = log
            .read("s", Some(ids[0]), 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(log.latest_id("s").await.unwrap(), Some(ids[4]));
    }

    #[tokio::test]
    async fn test_zero_max_len_is_unbounded() {
        let log = InMemoryStreamLog::with_max_len(0);
        for n in 0..10 {
            log.append("s", &fields(n)).await.unwrap();
        }
        assert_eq!(log.len("s"), 10);
    }

    #[tokio::test]
    async fn test_read_times_out_empty() {
        let log = InMemoryStreamLog::new();
        let entries = log.read("empty", None, 10, Duration::from_millis(20)).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(log.latest_id("empty").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blocked_read_wakes_on_append() {
        let log = InMemoryStreamLog::new();
        let reader = {
            let log = log.clone();
            tokio::spawn(async move { log.read("s", None, 10, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        log.append("s", &fields(7)).await.unwrap();

        let entries = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields["n"], "7");
    }

    #[test]
    fn test_next_id_bumps_sequence_when_clock_lags() {
        let far_future = EntryId::new(u64::MAX / 2, 3);
        assert_eq!(next_id(Some(far_future)), EntryId::new(u64::MAX / 2, 4));
    }
}
