//! Canonical trade schema and the exchange-event normalizer.
//!
//! The upstream feed delivers Binance-style trade objects
//! (`{"T": 1700000000000, "p": "64000.42", "q": "0.012", "m": false}`).
//! `normalize` turns one of those into an immutable `Trade`; everything
//! downstream only ever sees the canonical form.

use serde::{Deserialize, Serialize};

use super::error::MalformedEventError;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Wire name used in stream fields and forecast frames.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// +1.0 for buys, -1.0 for sells.
    pub const fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeSide {
    type Err = MalformedEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(MalformedEventError::UnknownSide(other.to_string())),
        }
    }
}

/// A normalized trade. Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange trade time in Unix milliseconds.
    pub ts: u64,
    /// Execution price, strictly positive.
    pub price: f64,
    /// Executed quantity, non-negative.
    pub qty: f64,
    /// Aggressor side.
    pub side: TradeSide,
}

impl Trade {
    /// Build a trade, enforcing the price/quantity invariants.
    pub fn new(ts: u64, price: f64, qty: f64, side: TradeSide) -> Result<Self, MalformedEventError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(MalformedEventError::InvalidValue { field: "price", value: price });
        }
        if !qty.is_finite() || qty < 0.0 {
            return Err(MalformedEventError::InvalidValue { field: "qty", value: qty });
        }
        Ok(Self { ts, price, qty, side })
    }
}

/// A field the exchange may send either as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn to_f64(&self, field: &'static str) -> Result<f64, MalformedEventError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse::<f64>().map_err(|_| MalformedEventError::NonNumeric {
                field,
                value: s.clone(),
            }),
        }
    }
}

/// Raw exchange trade event as decoded from the upstream feed.
///
/// Only the fields the normalizer needs are captured; everything else
/// in the payload (event type, symbol, trade id) is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTradeEvent {
    /// Trade time (Unix ms).
    #[serde(rename = "T")]
    pub trade_time: Option<u64>,
    /// Price.
    #[serde(rename = "p")]
    pub price: Option<NumberOrString>,
    /// Quantity.
    #[serde(rename = "q")]
    pub quantity: Option<NumberOrString>,
    /// True when the buyer was the resting (maker) order.
    #[serde(rename = "m")]
    pub buyer_is_maker: Option<bool>,
}

impl RawTradeEvent {
    /// Decode a raw feed message.
    pub fn from_json(text: &str) -> Result<Self, MalformedEventError> {
        serde_json::from_str(text).map_err(|e| MalformedEventError::InvalidPayload(e.to_string()))
    }
}

/// Map a raw exchange event into the canonical trade schema.
///
/// Buyer-is-maker means the incoming taker sold, so `m: true` is a sell
/// and `m: false` is a buy.
pub fn normalize(raw: &RawTradeEvent) -> Result<Trade, MalformedEventError> {
    let ts = raw.trade_time.ok_or(MalformedEventError::MissingField("T"))?;
    let price = raw
        .price
        .as_ref()
        .ok_or(MalformedEventError::MissingField("p"))?
        .to_f64("p")?;
    let qty = raw
        .quantity
        .as_ref()
        .ok_or(MalformedEventError::MissingField("q"))?
        .to_f64("q")?;
    let buyer_is_maker = raw.buyer_is_maker.ok_or(MalformedEventError::MissingField("m"))?;

    let side = if buyer_is_maker { TradeSide::Sell } else { TradeSide::Buy };
    Trade::new(ts, price, qty, side)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawTradeEvent {
        RawTradeEvent::from_json(json).unwrap()
    }

    #[test]
    fn test_normalize_taker_buy() {
        let trade = normalize(&raw(
            r#"{"e":"trade","s":"BTCUSDT","T":1700000000000,"p":"64000.42","q":"0.012","m":false}"#,
        ))
        .unwrap();
        assert_eq!(trade.ts, 1_700_000_000_000);
        assert_eq!(trade.price, 64000.42);
        assert_eq!(trade.qty, 0.012);
        assert_eq!(trade.side, TradeSide::Buy);
    }

    #[test]
    fn test_normalize_buyer_maker_is_sell() {
        let trade = normalize(&raw(r#"{"T":1700000000000,"p":"64000.42","q":"0.012","m":true}"#)).unwrap();
        assert_eq!(trade.side, TradeSide::Sell);
    }

    #[test]
    fn test_normalize_accepts_numeric_fields() {
        let trade = normalize(&raw(r#"{"T":1,"p":100.5,"q":2,"m":false}"#)).unwrap();
        assert_eq!(trade.price, 100.5);
        assert_eq!(trade.qty, 2.0);
    }

    #[test]
    fn test_normalize_rejects_non_numeric_price() {
        let err = normalize(&raw(r#"{"T":1,"p":"abc","q":"1","m":false}"#)).unwrap_err();
        assert!(matches!(err, MalformedEventError::NonNumeric { field: "p", .. }));
    }

    #[test]
    fn test_normalize_rejects_non_numeric_quantity() {
        let err = normalize(&raw(r#"{"T":1,"p":"1","q":"","m":false}"#)).unwrap_err();
        assert!(matches!(err, MalformedEventError::NonNumeric { field: "q", .. }));
    }

    #[test]
    fn test_normalize_requires_timestamp() {
        let err = normalize(&raw(r#"{"p":"1","q":"1","m":false}"#)).unwrap_err();
        assert_eq!(err, MalformedEventError::MissingField("T"));
    }

    #[test]
    fn test_normalize_rejects_non_positive_price() {
        let err = normalize(&raw(r#"{"T":1,"p":"0","q":"1","m":false}"#)).unwrap_err();
        assert!(matches!(err, MalformedEventError::InvalidValue { field: "price", .. }));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(RawTradeEvent::from_json("42").is_err());
        assert!(RawTradeEvent::from_json("not json").is_err());
    }

    #[test]
    fn test_side_round_trip_names() {
        assert_eq!("buy".parse::<TradeSide>().unwrap(), TradeSide::Buy);
        assert_eq!("sell".parse::<TradeSide>().unwrap(), TradeSide::Sell);
        assert!("hold".parse::<TradeSide>().is_err());
        assert_eq!(TradeSide::Sell.to_string(), "sell");
    }
}
