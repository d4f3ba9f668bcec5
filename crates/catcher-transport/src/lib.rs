//! Transport layer for catcher sessions.
//!
//! Provides:
//! - WebSocket transport over axum (feature: websocket)

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::{WsSink, WsStream, connection, create_ws_router, ws_handler};
