//! Wire frames exchanged with a catcher.

use bytes::Bytes;

/// A single message-oriented frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 application payload.
    Text(String),
    /// Binary application payload.
    Binary(Bytes),
    /// Liveness ping.
    Ping(Bytes),
    /// Liveness response.
    Pong(Bytes),
    /// Graceful close.
    Close,
}

impl Frame {
    /// Create an empty liveness ping.
    #[must_use]
    pub const fn ping() -> Self {
        Self::Ping(Bytes::new())
    }

    /// Length of the frame payload in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data.len(),
            Self::Close => 0,
        }
    }

    /// Whether this frame is a control frame (ping, pong or close).
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Ping(_) | Self::Pong(_) | Self::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_len() {
        assert_eq!(Frame::Text("héllo".into()).payload_len(), 6);
        assert_eq!(Frame::Binary(Bytes::from_static(b"abc")).payload_len(), 3);
        assert_eq!(Frame::ping().payload_len(), 0);
        assert_eq!(Frame::Close.payload_len(), 0);
    }

    #[test]
    fn test_control_frames() {
        assert!(Frame::ping().is_control());
        assert!(Frame::Pong(Bytes::new()).is_control());
        assert!(Frame::Close.is_control());
        assert!(!Frame::Text(String::new()).is_control());
    }
}
