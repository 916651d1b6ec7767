//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! service's workflows. Each use case owns its loop state and talks to
//! the outside world only through `crate::ports`.
//!
//! Use cases:
//! - `ForecastSession`: Per-connection read → predict → push loop
//! - `FeatureProcessor`: Trade stream → OFI feature stream
//! - `TradeIngestor`: Exchange messages → trade stream (+ archive)
//! - `PredictorService` / `ModelWatcher`: Shared predictor with hot reload
//! - `replay`: Archived trades back into the trade stream

pub mod forecast_session;
pub mod ingest;
pub mod model_watcher;
pub mod predictor_service;
pub mod processor;
pub mod replay;

pub use forecast_session::{CloseReason, ForecastSession, SessionReport, SessionSettings, SessionState};
pub use ingest::TradeIngestor;
pub use model_watcher::ModelWatcher;
pub use predictor_service::PredictorService;
pub use processor::{FeatureProcessor, ProcessorSettings};
pub use replay::replay;
