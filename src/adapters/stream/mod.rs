//! Stream Transport Adapters - StreamLog Implementations
//!
//! - `redis`: Redis Streams (XADD / XREAD BLOCK), one connection per consumer
//! - `memory`: In-process log with the same id and blocking semantics

pub mod memory;
pub mod redis;

pub use memory::InMemoryStreamLog;
pub use self::redis::{RedisConnector, RedisStreamLog};
