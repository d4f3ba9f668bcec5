//! Per-connection catcher session.
//!
//! A session owns one connection and runs two tasks:
//! - the write multiplexer, which interleaves pings with queued messages
//!   and owns teardown and deregistration
//! - the read sentinel, which drains inbound frames to detect pongs and
//!   connection loss
//!
//! The sentinel never signals the multiplexer. When the read side fails it
//! closes the handle, and the multiplexer tears down on its next write, at
//! the latest one ping interval later.

mod sentinel;
mod writer;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{ConfigError, Connection, ConnectionId, FrameSink, FrameStream, Hub, SessionConfig};

/// Lifecycle of a session, derived from its two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both tasks are running.
    Active,
    /// One task has exited; teardown is in progress.
    Closing,
    /// Both tasks have exited and the session is deregistered.
    Closed,
}

/// Session error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session {0} is closing")]
    Closing(ConnectionId),
    #[error("Outbound queue of session {0} is already closed")]
    QueueClosed(ConnectionId),
}

/// A live connection to one catcher.
pub struct Session<M> {
    id: ConnectionId,
    outbound: RwLock<Option<mpsc::Sender<M>>>,
    queued: Arc<AtomicUsize>,
    closed: CancellationToken,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl<M> Session<M>
where
    M: Serialize + Send + Sync + 'static,
{
    /// Start a session on an accepted connection.
    ///
    /// Spawns the write multiplexer and the read sentinel and returns
    /// immediately. On teardown the session removes itself from `hub`.
    ///
    /// # Errors
    /// Returns error if `config` fails [`SessionConfig::validate`]; nothing
    /// is spawned in that case.
    pub fn spawn<W, R, H>(
        connection: Connection<W, R>,
        hub: Arc<H>,
        config: &SessionConfig,
    ) -> Result<Self, ConfigError>
    where
        W: FrameSink,
        R: FrameStream,
        H: Hub + ?Sized,
    {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.outbound_capacity);
        let queued = Arc::new(AtomicUsize::new(0));
        let (writer, reader) = connection.split();
        let id = writer.id();
        let closed = writer.closed_token();

        let read_task = tokio::spawn(sentinel::read_loop(
            reader,
            Arc::clone(&hub),
            config.max_message_size,
        ));
        let write_task = tokio::spawn(writer::write_loop(
            writer,
            rx,
            Arc::clone(&queued),
            hub,
            config.ping_interval,
            config.write_wait,
        ));

        tracing::debug!(connection_id = %id, "Catcher session started");

        Ok(Self {
            id,
            outbound: RwLock::new(Some(tx)),
            queued,
            closed,
            writer: write_task,
            reader: read_task,
        })
    }

    /// Connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for delivery.
    ///
    /// Waits while the queue is full.
    ///
    /// # Errors
    /// Returns `Closing` if the session is torn down before the message is
    /// queued, or `QueueClosed` if [`Self::close`] was already called.
    pub async fn enqueue(&self, msg: M) -> Result<(), SessionError> {
        let tx = self
            .outbound
            .read()
            .await
            .clone()
            .ok_or(SessionError::QueueClosed(self.id))?;

        let permit = tx
            .reserve()
            .await
            .map_err(|_| SessionError::Closing(self.id))?;
        // Counted before the writer can see it, so the count never underflows
        self.queued.fetch_add(1, Ordering::AcqRel);
        permit.send(msg);
        Ok(())
    }

    /// Close the outbound queue.
    ///
    /// Messages already queued are still written, then a close frame is sent
    /// and the session tears down. Returns `false` if it was already closed.
    pub async fn close(&self) -> bool {
        self.outbound.write().await.take().is_some()
    }

    /// Number of queued messages not yet picked up by the writer.
    ///
    /// Messages queued before [`Self::close`] still count until the writer
    /// picks them up.
    /// Once the write multiplexer has exited nothing is left to write and
    /// this is 0.
    #[must_use]
    pub fn pending(&self) -> usize {
        if self.writer.is_finished() {
            return 0;
        }
        self.queued.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match (self.writer.is_finished(), self.reader.is_finished()) {
            (false, false) => SessionState::Active,
            (true, true) => SessionState::Closed,
            _ => SessionState::Closing,
        }
    }

    /// Whether the connection handle has been closed by either task.
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
