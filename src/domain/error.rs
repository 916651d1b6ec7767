//! Error taxonomy shared by every consumer loop.
//!
//! Per-event errors (`MalformedEventError`, `PredictionError`) are contained
//! inside one loop iteration. `TransportUnavailableError` ends the owning
//! loop. `ClientDisconnected` is the expected end of a forecast session.

use thiserror::Error;

/// A raw exchange event or stream entry that cannot be turned into a typed record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedEventError {
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field that must be numeric could not be parsed.
    #[error("field `{field}` is not numeric: {value:?}")]
    NonNumeric { field: &'static str, value: String },
    /// A numeric field parsed but violates the record invariants.
    #[error("field `{field}` has invalid value {value}")]
    InvalidValue { field: &'static str, value: f64 },
    /// The side field is neither `buy` nor `sell`.
    #[error("unknown trade side {0:?}")]
    UnknownSide(String),
    /// The payload is not a JSON object of the expected shape.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// The log store could not be reached or answered with a protocol error.
#[derive(Debug, Clone, Error)]
#[error("stream transport unavailable: {0}")]
pub struct TransportUnavailableError(pub String);

/// Model inference failed for a single feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    /// A projected feature column is NaN or infinite.
    #[error("feature `{column}` is not finite ({value})")]
    NonFiniteFeature { column: String, value: f64 },
    /// The estimator produced a score outside the real line.
    #[error("estimator produced a non-finite score ({0})")]
    NonFiniteScore(f64),
}

/// The client side of a forecast session is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client disconnected")]
pub struct ClientDisconnected;

/// A model artifact exists but cannot be used.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact file could not be read.
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The artifact is not valid JSON of the expected shape.
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The artifact parsed but its contents are inconsistent.
    #[error("invalid model artifact: {0}")]
    Invalid(String),
}
