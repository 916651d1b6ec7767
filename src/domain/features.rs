//! Feature vector assembly.
//!
//! Every place that feeds the predictor goes through `FeatureVector::resolve`,
//! so the model and heuristic variants always see the same OFI rule:
//! a non-zero upstream OFI wins, then a locally computed window OFI, and
//! when both are absent or zero the heuristic falls back to a signed
//! quantity proxy (`bias`).

use serde::Serialize;

use super::trade::{Trade, TradeSide};

/// Inputs handed to the predictor for one trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub ts: u64,
    pub qty: f64,
    pub side: TradeSide,
    pub price: f64,
    pub ofi: f64,
}

impl FeatureVector {
    /// Assemble the vector for `trade`.
    ///
    /// `upstream_ofi` is the value carried by the stream entry (feature
    /// stream); `local_ofi` is the consumer's own window, when it keeps one.
    pub fn resolve(trade: &Trade, upstream_ofi: Option<f64>, local_ofi: Option<f64>) -> Self {
        let ofi = upstream_ofi
            .filter(|ofi| *ofi != 0.0)
            .or(local_ofi)
            .unwrap_or(0.0);
        Self {
            ts: trade.ts,
            qty: trade.qty,
            side: trade.side,
            price: trade.price,
            ofi,
        }
    }

    /// Directional pressure: the OFI when non-zero, else the signed quantity.
    pub fn bias(&self) -> f64 {
        if self.ofi == 0.0 {
            self.side.sign() * self.qty
        } else {
            self.ofi
        }
    }

    /// Value of a named feature column; unknown columns project to 0.0.
    #[allow(clippy::cast_precision_loss)]
    pub fn column(&self, name: &str) -> f64 {
        match name {
            "ts" | "timestamp" => self.ts as f64,
            "price" => self.price,
            "qty" | "quantity" => self.qty,
            "side" => self.side.sign(),
            "ofi" => self.ofi,
            "bias" => self.bias(),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(side: TradeSide, qty: f64) -> Trade {
        Trade::new(1_700_000_000_000, 64000.0, qty, side).unwrap()
    }

    #[test]
    fn test_upstream_ofi_wins() {
        let fv = FeatureVector::resolve(&trade(TradeSide::Buy, 0.01), Some(0.3), Some(-0.5));
        assert_eq!(fv.ofi, 0.3);
        assert_eq!(fv.bias(), 0.3);
    }

    #[test]
    fn test_zero_upstream_falls_back_to_local() {
        let fv = FeatureVector::resolve(&trade(TradeSide::Buy, 0.01), Some(0.0), Some(-0.5));
        assert_eq!(fv.ofi, -0.5);
    }

    #[test]
    fn test_no_ofi_uses_signed_quantity() {
        let buy = FeatureVector::resolve(&trade(TradeSide::Buy, 0.01), None, None);
        assert_eq!(buy.ofi, 0.0);
        assert_eq!(buy.bias(), 0.01);

        let sell = FeatureVector::resolve(&trade(TradeSide::Sell, 0.02), Some(0.0), None);
        assert_eq!(sell.bias(), -0.02);
    }

    #[test]
    fn test_column_projection() {
        let fv = FeatureVector::resolve(&trade(TradeSide::Sell, 2.0), Some(0.1), None);
        assert_eq!(fv.column("price"), 64000.0);
        assert_eq!(fv.column("quantity"), 2.0);
        assert_eq!(fv.column("side"), -1.0);
        assert_eq!(fv.column("ofi"), 0.1);
        assert_eq!(fv.column("ma_15"), 0.0);
    }
}
