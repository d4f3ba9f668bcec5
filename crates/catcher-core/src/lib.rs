//! Per-connection session management for notification catchers.
//!
//! This crate provides the building blocks:
//! - `Session` - Write multiplexer + read sentinel for one connection
//! - `Catcher` - Registry of live sessions with broadcast fan-out
//! - `Connection` - Transport-agnostic duplex handle
//! - `Hub` trait for custom registries

pub mod catcher;
pub mod config;
pub mod connection;
pub mod frame;
pub mod hub;
#[cfg(feature = "memory")]
pub mod memory;
pub mod session;

pub use catcher::Catcher;
pub use config::{ConfigError, SessionConfig};
pub use connection::{Connection, ConnectionId, FrameSink, FrameStream, TransportError};
pub use frame::Frame;
pub use hub::Hub;
pub use session::{Session, SessionError, SessionState};
