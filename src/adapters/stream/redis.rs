//! Redis Streams Log - Production Stream Transport
//!
//! XADD / XREAD BLOCK / XREVRANGE against a shared Redis instance.
//! Every consumer gets its own `ConnectionManager`: XREAD BLOCK holds the
//! connection for the whole wait, so sharing one multiplexed connection
//! would stall every other consumer behind it.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::streams::{StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError};
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::domain::entry::{EntryId, FieldMap, RawEntry};
use crate::domain::error::TransportUnavailableError;
use crate::ports::stream_log::{LogConnector, StreamLog};

/// Time allowed for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack on top of the longest XREAD block before a response is considered lost.
const RESPONSE_SLACK: Duration = Duration::from_secs(5);

impl From<RedisError> for TransportUnavailableError {
    fn from(err: RedisError) -> Self {
        Self(err.to_string())
    }
}

/// Opens one Redis connection per consumer.
#[derive(Clone)]
pub struct RedisConnector {
    client: Client,
    url: String,
    response_timeout: Duration,
}

impl RedisConnector {
    /// Create a connector for `redis_url` (e.g. "redis://127.0.0.1:6379").
    ///
    /// `max_block` is the longest XREAD block any consumer will request.
    pub fn new(redis_url: &str, max_block: Duration) -> Result<Self, TransportUnavailableError> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client,
            url: redis_url.to_string(),
            response_timeout: max_block + RESPONSE_SLACK,
        })
    }
}

#[async_trait]
impl LogConnector for RedisConnector {
    type Log = RedisStreamLog;

    #[instrument(skip(self), fields(url = %self.url))]
    async fn open(&self) -> Result<Self::Log, TransportUnavailableError> {
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(self.response_timeout);

        let conn = timeout(
            CONNECT_TIMEOUT,
            ConnectionManager::new_with_config(self.client.clone(), config),
        )
        .await
        .map_err(|_| TransportUnavailableError("Redis connection timeout after 5 seconds".to_string()))??;

        info!("Connected to Redis");
        Ok(RedisStreamLog { conn })
    }
}

/// A single consumer's handle onto Redis Streams.
#[derive(Clone)]
pub struct RedisStreamLog {
    conn: ConnectionManager,
}

fn parse_id(raw: &str) -> Result<EntryId, TransportUnavailableError> {
    raw.parse()
        .map_err(|_| TransportUnavailableError(format!("Redis returned malformed stream id {raw:?}")))
}

#[async_trait]
impl StreamLog for RedisStreamLog {
    async fn append(
        &self,
        stream: &str,
        fields: &FieldMap,
    ) -> Result<EntryId, TransportUnavailableError> {
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut conn = self.conn.clone();
        let id: String = conn.xadd(stream, "*", &items).await?;
        parse_id(&id)
    }

    async fn read(
        &self,
        stream: &str,
        after: Option<EntryId>,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<RawEntry>, TransportUnavailableError> {
        // BLOCK 0 would wait forever
        let block_ms = usize::try_from(block.as_millis()).unwrap_or(usize::MAX).max(1);
        let options = StreamReadOptions::default()
            .count(max_count.max(1))
            .block(block_ms);
        let start = after.map_or_else(|| "0-0".to_string(), |id| id.to_string());

        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[start.as_str()], &options)
            .await?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for key in reply.keys {
            for item in key.ids {
                let mut fields = FieldMap::new();
                for (name, value) in &item.map {
                    let value: String = redis::from_redis_value(value)?;
                    fields.insert(name.clone(), value);
                }
                entries.push(RawEntry {
                    id: parse_id(&item.id)?,
                    fields,
                });
            }
        }

        debug!(stream, count = entries.len(), "XREAD returned entries");
        Ok(entries)
    }

    async fn latest_id(&self, stream: &str) -> Result<Option<EntryId>, TransportUnavailableError> {
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = conn.xrevrange_count(stream, "+", "-", 1).await?;
        reply.ids.first().map(|item| parse_id(&item.id)).transpose()
    }
}
