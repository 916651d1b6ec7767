//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (Redis, WebSockets, file I/O, Prometheus).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `stream`: Redis Streams and in-memory `StreamLog` implementations
//! - `feeds`: Exchange trade WebSocket (Binance)
//! - `gateway`: axum WebSocket surface driving forecast sessions
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: Cursor checkpoints, trade archive, model artifact

pub mod feeds;
pub mod gateway;
pub mod metrics;
pub mod persistence;
pub mod stream;
