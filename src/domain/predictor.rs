//! Up/down probability scoring.
//!
//! `Predictor` is a sum type chosen once when the artifact is loaded:
//! `Model` scores through the artifact's estimator, `Heuristic` maps the
//! feature bias linearly around 0.5. Nothing here checks for a model per
//! call, and a model failure is reported, never silently downgraded.

use serde::{Deserialize, Serialize};

use super::error::{ArtifactError, PredictionError};
use super::features::FeatureVector;

/// Slope of the heuristic probability around 0.5.
pub const HEURISTIC_SLOPE: f64 = 0.05;

/// Which variant produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Model,
    Heuristic,
}

impl PredictionSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Probabilities for the next move. `prob_down == 1 - prob_up`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub prob_up: f64,
    pub prob_down: f64,
    pub source: PredictionSource,
}

impl Prediction {
    fn new(prob_up: f64, source: PredictionSource) -> Self {
        let prob_up = prob_up.clamp(0.0, 1.0);
        Self {
            prob_up,
            prob_down: 1.0 - prob_up,
            source,
        }
    }
}

/// Serialized estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    /// Binary logistic regression: `p_up = sigmoid(intercept + w·x)`.
    LogisticRegression { coefficients: Vec<f64>, intercept: f64 },
}

impl Estimator {
    /// Probability of the positive (up) class for an already projected row.
    fn predict_proba(&self, row: &[f64]) -> Result<f64, PredictionError> {
        match self {
            Self::LogisticRegression { coefficients, intercept } => {
                let z = intercept
                    + coefficients
                        .iter()
                        .zip(row)
                        .map(|(w, x)| w * x)
                        .sum::<f64>();
                if !z.is_finite() {
                    return Err(PredictionError::NonFiniteScore(z));
                }
                Ok(1.0 / (1.0 + (-z).exp()))
            }
        }
    }

    fn input_width(&self) -> usize {
        match self {
            Self::LogisticRegression { coefficients, .. } => coefficients.len(),
        }
    }
}

/// A trained model bundle: estimator plus its ordered feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub estimator: Estimator,
    pub feature_cols: Vec<String>,
}

impl ModelArtifact {
    /// Check the bundle is internally consistent.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.feature_cols.is_empty() {
            return Err(ArtifactError::Invalid("feature_cols is empty".to_string()));
        }
        let width = self.estimator.input_width();
        if width != self.feature_cols.len() {
            return Err(ArtifactError::Invalid(format!(
                "estimator expects {width} inputs but {} feature columns are declared",
                self.feature_cols.len()
            )));
        }
        let Estimator::LogisticRegression { coefficients, intercept } = &self.estimator;
        if !intercept.is_finite() || coefficients.iter().any(|w| !w.is_finite()) {
            return Err(ArtifactError::Invalid(
                "estimator parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Project a feature vector onto the declared column order.
    pub fn project(&self, features: &FeatureVector) -> Result<Vec<f64>, PredictionError> {
        self.feature_cols
            .iter()
            .map(|col| {
                let value = features.column(col);
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(PredictionError::NonFiniteFeature {
                        column: col.clone(),
                        value,
                    })
                }
            })
            .collect()
    }
}

/// Active scoring variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Predictor {
    Model(ModelArtifact),
    Heuristic,
}

impl Predictor {
    pub const fn source(&self) -> PredictionSource {
        match self {
            Self::Model(_) => PredictionSource::Model,
            Self::Heuristic => PredictionSource::Heuristic,
        }
    }

    /// Score one feature vector with the active variant.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictionError> {
        match self {
            Self::Model(artifact) => {
                let row = artifact.project(features)?;
                let prob_up = artifact.estimator.predict_proba(&row)?;
                Ok(Prediction::new(prob_up, PredictionSource::Model))
            }
            Self::Heuristic => Ok(heuristic(features)),
        }
    }
}

/// Fallback scoring: `prob_up = clamp(0.5 + bias * 0.05, 0, 1)`.
pub fn heuristic(features: &FeatureVector) -> Prediction {
    let bias = features.bias();
    let prob_up = if bias.is_finite() {
        0.5 + bias * HEURISTIC_SLOPE
    } else {
        0.5
    };
    Prediction::new(prob_up, PredictionSource::Heuristic)
}
