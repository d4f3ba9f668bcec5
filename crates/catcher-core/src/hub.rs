//! The registry a session reports back to.

use async_trait::async_trait;

use crate::ConnectionId;

/// Owner of the registry of live sessions.
///
/// A session's write multiplexer calls [`Hub::deregister`] exactly once during
/// teardown. Implementations must tolerate concurrent removal while the
/// registry is being iterated, and removal of an absent key.
#[async_trait]
pub trait Hub: Send + Sync + 'static {
    /// Remove the session registered under `id`.
    ///
    /// Returns `true` if an entry was removed.
    async fn deregister(&self, id: ConnectionId) -> bool;

    /// Called by the read sentinel for every liveness response.
    fn on_pong(&self, id: ConnectionId, payload: &[u8]) {
        tracing::info!(
            connection_id = %id,
            "Pong from catcher, msg: {}",
            String::from_utf8_lossy(payload)
        );
    }
}
