//! Forecast frame pushed to gateway clients, one per processed trade.

use serde::Serialize;

use super::entry::EntryId;
use super::features::FeatureVector;
use super::predictor::{Prediction, PredictionSource};
use super::trade::TradeSide;

/// Wire message for one forecast. Exists only on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastFrame {
    /// Stream entry id the forecast was derived from (`ms-seq`).
    #[serde(serialize_with = "serialize_id")]
    pub id: EntryId,
    pub ts: u64,
    pub price: f64,
    pub qty: f64,
    pub side: TradeSide,
    pub ofi: f64,
    pub prob_up: f64,
    pub prob_down: f64,
    pub source: PredictionSource,
    /// Same value as `source`; older dashboards read this key.
    pub predictor: PredictionSource,
}

impl ForecastFrame {
    pub fn new(id: EntryId, features: &FeatureVector, prediction: &Prediction) -> Self {
        Self {
            id,
            ts: features.ts,
            price: features.price,
            qty: features.qty,
            side: features.side,
            ofi: features.ofi,
            prob_up: prediction.prob_up,
            prob_down: prediction.prob_down,
            source: prediction.source,
            predictor: prediction.source,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn serialize_id<S: serde::Serializer>(id: &EntryId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::predictor::heuristic;
    use crate::domain::trade::Trade;

    #[test]
    fn test_frame_json_fields() {
        let trade = Trade::new(1_700_000_000_000, 64000.0, 0.01, TradeSide::Buy).unwrap();
        let features = FeatureVector::resolve(&trade, None, None);
        let frame = ForecastFrame::new(EntryId::new(1, 0), &features, &heuristic(&features));

        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["id"], "1-0");
        assert_eq!(value["ts"], 1_700_000_000_000u64);
        assert_eq!(value["price"], 64000.0);
        assert_eq!(value["qty"], 0.01);
        assert_eq!(value["side"], "buy");
        assert_eq!(value["ofi"], 0.0);
        assert_eq!(value["source"], "heuristic");
        assert_eq!(value["predictor"], "heuristic");
        let up = value["prob_up"].as_f64().unwrap();
        let down = value["prob_down"].as_f64().unwrap();
        assert!((up + down - 1.0).abs() < 1e-12);
    }
}
