//! Ports Layer - Hexagonal Architecture Interfaces
//!
//! Defines trait boundaries between the domain/usecases and the
//! outside world. Adapters implement these traits; usecases depend
//! only on them, so every loop can be driven by fakes in tests.

pub mod frame_sink;
pub mod model_store;
pub mod repository;
pub mod stream_log;
pub mod telemetry;

pub use frame_sink::FrameSink;
pub use model_store::ModelStore;
pub use repository::Repository;
pub use stream_log::{LogConnector, StreamLog};
pub use telemetry::{NoopTelemetry, Telemetry};
