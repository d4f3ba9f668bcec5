//! Transport-agnostic duplex connection handle.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::Frame;

/// Connection identifier, used as the registry key.
pub type ConnectionId = Uuid;

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("Peer closed the connection")]
    PeerClosed,
    #[error("Write timed out after {0:?}")]
    Timeout(Duration),
    #[error("Frame of {size} bytes exceeds read limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Write half of a transport.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Flush and release the write half.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a transport.
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Read the next frame. `None` marks the end of the stream.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// An accepted duplex connection.
pub struct Connection<W, R> {
    id: ConnectionId,
    sink: W,
    stream: R,
}

impl<W, R> Connection<W, R>
where
    W: FrameSink,
    R: FrameStream,
{
    /// Wrap the two halves of an accepted connection.
    #[must_use]
    pub fn new(sink: W, stream: R) -> Self {
        Self {
            id: Uuid::new_v4(),
            sink,
            stream,
        }
    }

    /// Connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Split into a writer and a reader sharing one closed state.
    ///
    /// Closing either half closes the handle: the writer rejects further
    /// writes and a read blocked on the reader returns.
    #[must_use]
    pub fn split(self) -> (ConnectionWriter<W>, ConnectionReader<R>) {
        let closed = CancellationToken::new();
        let writer = ConnectionWriter {
            id: self.id,
            sink: self.sink,
            closed: closed.clone(),
        };
        let reader = ConnectionReader {
            id: self.id,
            stream: self.stream,
            closed,
            read_limit: None,
        };
        (writer, reader)
    }
}

/// Write side of a connection handle.
pub struct ConnectionWriter<W> {
    id: ConnectionId,
    sink: W,
    closed: CancellationToken,
}

impl<W: FrameSink> ConnectionWriter<W> {
    /// Connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the handle has been closed from either side.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token observing the handle's closed state.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Write one frame, failing if it does not complete within `deadline`.
    ///
    /// # Errors
    /// Returns `Closed` if the handle is (or becomes) closed, `Timeout` if the
    /// deadline passes, or the transport's own error.
    pub async fn send(&mut self, frame: Frame, deadline: Duration) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            () = self.closed.cancelled() => Err(TransportError::Closed),
            result = tokio::time::timeout(deadline, self.sink.send(frame)) => {
                result.unwrap_or(Err(TransportError::Timeout(deadline)))
            }
        }
    }

    /// Serialize `msg` as JSON and write it as a text frame.
    ///
    /// # Errors
    /// Returns `Serialize` if encoding fails, otherwise as [`Self::send`].
    pub async fn send_json<M: Serialize + Sync>(
        &mut self,
        msg: &M,
        deadline: Duration,
    ) -> Result<(), TransportError> {
        let json = serde_json::to_string(msg)?;
        self.send(Frame::Text(json), deadline).await
    }

    /// Close the handle and release the write half.
    ///
    /// The sink gets `deadline` to flush and close; a sink that takes longer
    /// is abandoned unflushed.
    pub async fn close(&mut self, deadline: Duration) {
        self.closed.cancel();
        match tokio::time::timeout(deadline, self.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %self.id, "Error closing sink: {e}");
            }
            Err(_) => {
                tracing::warn!(connection_id = %self.id, "Sink close timed out after {deadline:?}");
            }
        }
    }
}

/// Read side of a connection handle.
pub struct ConnectionReader<R> {
    id: ConnectionId,
    stream: R,
    closed: CancellationToken,
    read_limit: Option<usize>,
}

impl<R: FrameStream> ConnectionReader<R> {
    /// Connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Reject inbound frames whose payload exceeds `limit` bytes.
    pub const fn set_read_limit(&mut self, limit: usize) {
        self.read_limit = Some(limit);
    }

    /// Block until the next frame arrives. There is no read deadline.
    ///
    /// # Errors
    /// Returns `Closed` if the handle is closed while waiting, `PeerClosed` on
    /// a close frame or end of stream, `FrameTooLarge` when the read limit is
    /// exceeded, or the transport's own error.
    pub async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        let next = tokio::select! {
            () = self.closed.cancelled() => return Err(TransportError::Closed),
            next = self.stream.next_frame() => next,
        };

        let frame = match next {
            Some(result) => result?,
            None => return Err(TransportError::PeerClosed),
        };

        if let Some(limit) = self.read_limit {
            let size = frame.payload_len();
            if size > limit {
                return Err(TransportError::FrameTooLarge { size, limit });
            }
        }

        match frame {
            Frame::Close => Err(TransportError::PeerClosed),
            frame => Ok(frame),
        }
    }

    /// Close the handle. The write half fails on its next write.
    pub fn close(&self) {
        self.closed.cancel();
    }
}
