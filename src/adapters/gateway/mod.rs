//! Forecast Gateway Adapters - Client-facing WebSocket Surface

pub mod server;
pub mod sink;

pub use server::GatewayServer;
pub use sink::WsFrameSink;
