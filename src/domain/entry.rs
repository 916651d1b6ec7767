//! Stream entries, entry ids and consumer cursors.
//!
//! Entries travel through the transport as flat string field maps. They
//! are parsed exactly once, at the read boundary, into a typed
//! `StreamEntry` so that consumers never touch loosely typed fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::MalformedEventError;
use super::trade::{Trade, TradeSide};

/// Flat field map as stored in the log.
pub type FieldMap = BTreeMap<String, String>;

/// Transport-assigned entry id (`<ms>-<seq>`), totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId {
    /// Millisecond component.
    pub ms: u64,
    /// Sequence within the millisecond.
    pub seq: u64,
}

impl EntryId {
    /// Create an id from its two components.
    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = MalformedEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MalformedEventError::InvalidPayload(format!("invalid entry id {s:?}"));
        let (ms, seq) = match s.split_once('-') {
            Some((ms, seq)) => (ms, seq),
            None => (s, "0"),
        };
        Ok(Self {
            ms: ms.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

/// An entry exactly as the transport returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub id: EntryId,
    pub fields: FieldMap,
}

/// Trade plus the OFI computed upstream by the feature processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRecord {
    pub trade: Trade,
    pub ofi: f64,
}

/// Typed payload of a stream entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryPayload {
    /// A normalized trade from the trade stream.
    Trade(Trade),
    /// A derived feature record from the feature stream.
    Feature(FeatureRecord),
}

impl EntryPayload {
    /// The trade carried by either variant.
    pub const fn trade(&self) -> &Trade {
        match self {
            Self::Trade(trade) => trade,
            Self::Feature(record) => &record.trade,
        }
    }

    /// OFI supplied by the transport, if any.
    pub const fn upstream_ofi(&self) -> Option<f64> {
        match self {
            Self::Trade(_) => None,
            Self::Feature(record) => Some(record.ofi),
        }
    }

    /// Serialize into the flat field layout used on the log.
    pub fn to_fields(&self) -> FieldMap {
        let trade = self.trade();
        let mut fields = FieldMap::new();
        fields.insert("ts".to_string(), trade.ts.to_string());
        fields.insert("price".to_string(), trade.price.to_string());
        fields.insert("qty".to_string(), trade.qty.to_string());
        fields.insert("side".to_string(), trade.side.as_str().to_string());
        if let Some(ofi) = self.upstream_ofi() {
            fields.insert("ofi".to_string(), ofi.to_string());
        }
        fields
    }

    /// Parse a field map. Entries carrying an `ofi` field are feature records.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, MalformedEventError> {
        let ts = required(fields, "ts")?
            .parse::<u64>()
            .map_err(|_| non_numeric(fields, "ts"))?;
        let price = parse_f64(fields, "price")?;
        let qty = parse_f64(fields, "qty")?;
        let side = required(fields, "side")?.parse::<TradeSide>()?;
        let trade = Trade::new(ts, price, qty, side)?;

        match fields.get("ofi") {
            None => Ok(Self::Trade(trade)),
            Some(_) => {
                let ofi = parse_f64(fields, "ofi")?;
                if !(-1.0..=1.0).contains(&ofi) {
                    return Err(MalformedEventError::InvalidValue { field: "ofi", value: ofi });
                }
                Ok(Self::Feature(FeatureRecord { trade, ofi }))
            }
        }
    }
}

fn required<'a>(fields: &'a FieldMap, field: &'static str) -> Result<&'a str, MalformedEventError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or(MalformedEventError::MissingField(field))
}

fn non_numeric(fields: &FieldMap, field: &'static str) -> MalformedEventError {
    MalformedEventError::NonNumeric {
        field,
        value: fields.get(field).cloned().unwrap_or_default(),
    }
}

fn parse_f64(fields: &FieldMap, field: &'static str) -> Result<f64, MalformedEventError> {
    required(fields, field)?
        .parse::<f64>()
        .map_err(|_| non_numeric(fields, field))
}

/// A parsed log entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub payload: EntryPayload,
}

impl TryFrom<&RawEntry> for StreamEntry {
    type Error = MalformedEventError;

    fn try_from(raw: &RawEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id,
            payload: EntryPayload::from_fields(&raw.fields)?,
        })
    }
}

/// Where a fresh cursor starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartFrom {
    /// Replay the whole stream.
    #[default]
    Beginning,
    /// Only entries appended after the consumer started.
    Latest,
}

/// A consumer's private read position over one stream.
///
/// Only moves forward: once advanced past id X it never re-requests X.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    stream: String,
    last: Option<EntryId>,
}

impl Cursor {
    /// Cursor positioned before the first entry.
    pub fn beginning(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            last: None,
        }
    }

    /// Cursor positioned after `last` (a persisted or resolved position).
    pub fn after(stream: impl Into<String>, last: Option<EntryId>) -> Self {
        Self {
            stream: stream.into(),
            last,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Last fully processed id, `None` before the first entry.
    pub const fn last(&self) -> Option<EntryId> {
        self.last
    }

    /// Move the cursor to `id`. Returns false (and leaves the cursor
    /// untouched) when `id` is not strictly after the current position.
    pub fn advance(&mut self, id: EntryId) -> bool {
        if self.last.is_some_and(|last| id <= last) {
            return false;
        }
        self.last = Some(id);
        true
    }
}
