//! WebSocket transport for catcher sessions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use catcher_core::{Catcher, Connection, Frame, FrameSink, FrameStream, TransportError};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::Serialize;

/// Write half of an upgraded WebSocket.
pub struct WsSink(SplitSink<WebSocket, Message>);

/// Read half of an upgraded WebSocket.
pub struct WsStream(SplitStream<WebSocket>);

/// Wrap an upgraded socket as a catcher connection.
#[must_use]
pub fn connection(socket: WebSocket) -> Connection<WsSink, WsStream> {
    let (sink, stream) = socket.split();
    Connection::new(WsSink(sink), WsStream(stream))
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(msg: Message) -> Frame {
    match msg {
        Message::Text(text) => Frame::Text(text.to_string()),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}

fn transport_error(e: &axum::Error) -> TransportError {
    TransportError::Transport(e.to_string())
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.0
            .send(into_message(frame))
            .await
            .map_err(|e| transport_error(&e))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await.map_err(|e| transport_error(&e))
    }
}

#[async_trait]
impl FrameStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        // axum answers pings on its own; they still surface here
        self.0
            .next()
            .await
            .map(|msg| msg.map(from_message).map_err(|e| transport_error(&e)))
    }
}

/// WebSocket upgrade handler.
///
/// Applies the catcher's read limit to the upgrade and hands the socket to
/// [`Catcher::accept`]. Use this as an Axum route handler.
pub async fn ws_handler<M>(
    ws: WebSocketUpgrade,
    State(catcher): State<Arc<Catcher<M>>>,
) -> impl IntoResponse
where
    M: Serialize + Send + Sync + 'static,
{
    let limit = catcher.config().max_message_size;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_failed_upgrade(|e: axum::Error| tracing::warn!("WebSocket upgrade failed: {e}"))
        .on_upgrade(move |socket| async move {
            if let Err(e) = catcher.accept(connection(socket)).await {
                tracing::error!("Rejected catcher connection: {e}");
            }
        })
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(catcher));
/// ```
#[must_use]
pub fn create_ws_router<M>(catcher: Arc<Catcher<M>>) -> Router
where
    M: Serialize + Send + Sync + 'static,
{
    Router::new()
        .route("/ws", axum::routing::get(ws_handler::<M>))
        .with_state(catcher)
}
