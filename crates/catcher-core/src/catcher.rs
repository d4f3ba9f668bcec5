//! Registry of live sessions with broadcast fan-out.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::future;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    ConfigError, Connection, ConnectionId, FrameSink, FrameStream, Hub, Session, SessionConfig,
};

/// Hub pushing notifications to every connected catcher.
///
/// Sessions register on accept and remove themselves on teardown.
pub struct Catcher<M> {
    clients: RwLock<HashMap<ConnectionId, Arc<Session<M>>>>,
    config: SessionConfig,
}

impl<M> Catcher<M>
where
    M: Serialize + Send + Sync + 'static,
{
    /// Create a new catcher hub.
    ///
    /// # Errors
    /// Returns error if the session configuration is unusable.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            clients: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Session configuration applied to every accepted connection.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session on an accepted connection and register it.
    ///
    /// The registry stays locked until the session is inserted, so a session
    /// failing immediately cannot deregister before it is registered.
    ///
    /// # Errors
    /// Returns error if the session configuration is unusable. The config is
    /// checked in [`Self::new`], so this does not happen in practice.
    pub async fn accept<W, R>(
        self: &Arc<Self>,
        connection: Connection<W, R>,
    ) -> Result<Arc<Session<M>>, ConfigError>
    where
        W: FrameSink,
        R: FrameStream,
    {
        let mut clients = self.clients.write().await;
        let session = Arc::new(Session::spawn(connection, Arc::clone(self), &self.config)?);
        clients.insert(session.id(), Arc::clone(&session));
        drop(clients);

        tracing::info!(connection_id = %session.id(), "Catcher connected");
        Ok(session)
    }

    /// Look up a registered session.
    pub async fn get(&self, id: ConnectionId) -> Option<Arc<Session<M>>> {
        self.clients.read().await.get(&id).cloned()
    }

    /// Whether a session is registered under `id`.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.read().await.contains_key(&id)
    }

    /// Number of registered sessions.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn snapshot(&self) -> Vec<Arc<Session<M>>> {
        self.clients.read().await.values().cloned().collect()
    }

    /// Queue `msg` on every registered session.
    ///
    /// Waits for backpressure on full queues. The registry is not locked
    /// while waiting, so sessions may come and go meanwhile. Returns the
    /// number of sessions that accepted the message.
    pub async fn broadcast(&self, msg: M) -> usize
    where
        M: Clone,
    {
        let sessions = self.snapshot().await;
        let results = future::join_all(sessions.iter().map(|session| {
            let msg = msg.clone();
            async move { session.enqueue(msg).await }
        }))
        .await;

        let mut delivered = 0;
        for result in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("Broadcast skipped session: {e}"),
            }
        }
        tracing::debug!(recipients = sessions.len(), delivered, "Broadcast message");
        delivered
    }

    /// Close every session's queue so each sends a close frame and exits.
    pub async fn shutdown(&self) {
        let sessions = self.snapshot().await;
        tracing::info!(sessions = sessions.len(), "Closing all catcher sessions");
        for session in sessions {
            session.close().await;
        }
    }
}

#[async_trait]
impl<M> Hub for Catcher<M>
where
    M: Serialize + Send + Sync + 'static,
{
    async fn deregister(&self, id: ConnectionId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::{Frame, SessionState, memory};

    fn catcher() -> Arc<Catcher<Value>> {
        Arc::new(Catcher::new(SessionConfig::default()).unwrap())
    }

    async fn wait_for_count(catcher: &Catcher<Value>, count: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while catcher.client_count().await != count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("client count not reached in time");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SessionConfig {
            outbound_capacity: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            Catcher::<Value>::new(config),
            Err(ConfigError::ZeroCapacity)
        ));
    }

    #[tokio::test]
    async fn test_accept_registers() {
        let catcher = catcher();
        let (conn, _peer) = memory::pair();
        let id = conn.id();

        let session = catcher.accept(conn).await.unwrap();

        assert_eq!(session.id(), id);
        assert!(catcher.contains(id).await);
        assert_eq!(catcher.client_count().await, 1);
        assert!(catcher.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_catcher() {
        let catcher = catcher();
        let (conn_a, mut peer_a) = memory::pair();
        let (conn_b, mut peer_b) = memory::pair();
        catcher.accept(conn_a).await.unwrap();
        catcher.accept(conn_b).await.unwrap();

        let delivered = catcher.broadcast(json!({"event": "build"})).await;
        assert_eq!(delivered, 2);

        let expected = Some(Frame::Text(r#"{"event":"build"}"#.into()));
        assert_eq!(peer_a.recv().await, expected);
        assert_eq!(peer_b.recv().await, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_session_leaves_registry() {
        let catcher = catcher();
        let (conn_ok, _peer_ok) = memory::pair();
        let (conn_bad, peer_bad) = memory::pair();
        let healthy = catcher.accept(conn_ok).await.unwrap();
        let broken = catcher.accept(conn_bad).await.unwrap();
        peer_bad.fail_writes();

        // The next ping fails on the broken connection only
        wait_for_count(&catcher, 1).await;
        assert!(catcher.contains(healthy.id()).await);
        assert!(!catcher.contains(broken.id()).await);

        assert_eq!(catcher.broadcast(json!(1)).await, 1);
        assert!(!catcher.deregister(broken.id()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_every_session() {
        let catcher = catcher();
        let (conn_a, mut peer_a) = memory::pair();
        let (conn_b, mut peer_b) = memory::pair();
        let a = catcher.accept(conn_a).await.unwrap();
        let b = catcher.accept(conn_b).await.unwrap();

        catcher.shutdown().await;

        assert_eq!(peer_a.recv().await, Some(Frame::Close));
        assert_eq!(peer_b.recv().await, Some(Frame::Close));
        wait_for_count(&catcher, 0).await;

        tokio::time::timeout(Duration::from_secs(10), async {
            while a.state() != SessionState::Closed || b.state() != SessionState::Closed {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
    }
}
