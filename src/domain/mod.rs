//! Domain layer - Core forecasting logic and models.
//!
//! Pure, synchronous code: trade normalization, typed stream entries and
//! cursors, the sliding-window OFI engine, feature assembly, the predictor
//! variants and the forecast frame. No I/O happens here (hexagonal
//! architecture inner ring); every type is testable in isolation.

pub mod entry;
pub mod error;
pub mod features;
pub mod frame;
pub mod ofi;
pub mod predictor;
pub mod trade;

// Re-export core types for convenience
pub use entry::{Cursor, EntryId, EntryPayload, FeatureRecord, FieldMap, RawEntry, StartFrom, StreamEntry};
pub use error::{
    ArtifactError, ClientDisconnected, MalformedEventError, PredictionError,
    TransportUnavailableError,
};
pub use features::FeatureVector;
pub use frame::ForecastFrame;
pub use ofi::OfiWindow;
pub use predictor::{ModelArtifact, Prediction, PredictionSource, Predictor};
pub use trade::{RawTradeEvent, Trade, TradeSide, normalize};
