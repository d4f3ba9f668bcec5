//! In-memory connection pair.
//!
//! Useful for tests and for embedding sessions without a network.
//! The `MemoryPeer` plays the remote catcher.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::{Connection, Frame, FrameSink, FrameStream, TransportError};

type Inbound = Result<Frame, TransportError>;

/// Create a connected pair: the local `Connection` and its remote peer.
#[must_use]
pub fn pair() -> (Connection<MemorySink, MemoryStream>, MemoryPeer) {
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (writable_tx, writable_rx) = watch::channel(true);
    let fail_writes = Arc::new(AtomicBool::new(false));
    let sink_closed = Arc::new(AtomicBool::new(false));

    let sink = MemorySink {
        written: written_tx,
        writable: writable_rx,
        fail_writes: Arc::clone(&fail_writes),
        closed: Arc::clone(&sink_closed),
    };
    let stream = MemoryStream { inbound: inbound_rx };
    let peer = MemoryPeer {
        written: written_rx,
        inbound: Some(inbound_tx),
        writable: writable_tx,
        fail_writes,
        sink_closed,
    };

    (Connection::new(sink, stream), peer)
}

/// Write half of an in-memory connection.
pub struct MemorySink {
    written: mpsc::UnboundedSender<Frame>,
    writable: watch::Receiver<bool>,
    fail_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        // A held peer stalls the write until released
        let writable = self.writable.wait_for(|open| *open).await.is_ok();
        if !writable {
            return Err(TransportError::PeerClosed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Transport("broken pipe".into()));
        }
        self.written
            .send(frame)
            .map_err(|_| TransportError::PeerClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Closing flushes, so a held peer stalls it like a full socket buffer
        if self.writable.wait_for(|open| *open).await.is_err() {
            return Err(TransportError::PeerClosed);
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Read half of an in-memory connection.
pub struct MemoryStream {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }
}

/// Remote end of an in-memory connection.
pub struct MemoryPeer {
    written: mpsc::UnboundedReceiver<Frame>,
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    writable: watch::Sender<bool>,
    fail_writes: Arc<AtomicBool>,
    sink_closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// Wait for the next frame written by the local side.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.written.recv().await
    }

    /// Take a written frame if one is ready.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.written.try_recv().ok()
    }

    /// Deliver a frame to the local reader.
    pub fn send(&self, frame: Frame) {
        self.push(Ok(frame));
    }

    /// Make the local reader observe an error.
    pub fn send_error(&self, err: TransportError) {
        self.push(Err(err));
    }

    fn push(&self, item: Inbound) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(item);
        }
    }

    /// End the inbound stream, as if the peer went away.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Stall local writes and closes until [`Self::release_writes`].
    pub fn hold_writes(&self) {
        self.writable.send_replace(false);
    }

    /// Let stalled writes through.
    pub fn release_writes(&self) {
        self.writable.send_replace(true);
    }

    /// Make every following local write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Whether the local side closed its write half and the close completed.
    #[must_use]
    pub fn is_sink_closed(&self) -> bool {
        self.sink_closed.load(Ordering::SeqCst)
    }
}
