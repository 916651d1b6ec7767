//! WebSocket frame sink.

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};

use crate::domain::error::ClientDisconnected;
use crate::ports::frame_sink::FrameSink;

/// Pushes frames as WebSocket text messages over the write half of a socket.
pub struct WsFrameSink<S> {
    sender: S,
}

impl<S> WsFrameSink<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl<S> FrameSink for WsFrameSink<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
{
    async fn push(&mut self, frame: String) -> Result<(), ClientDisconnected> {
        self.sender
            .send(Message::Text(frame))
            .await
            .map_err(|_| ClientDisconnected)
    }
}
