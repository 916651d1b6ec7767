//! Market Data Feed Adapters - Real-time Trade Streaming
//!
//! - Binance: `@trade` WebSocket stream, forwarded raw to trade ingest

pub mod binance;

pub use binance::BinanceTradeFeed;
