//! Write multiplexer: the only task that writes on a connection.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::mpsc,
    time::{self, Instant, Interval, MissedTickBehavior},
};

use crate::{Frame, FrameSink, Hub, connection::ConnectionWriter};

/// Interleave liveness pings with queued messages until a write fails or
/// the queue is closed, then tear the session down.
pub(super) async fn write_loop<W, M, H>(
    mut writer: ConnectionWriter<W>,
    mut outbound: mpsc::Receiver<M>,
    queued: Arc<AtomicUsize>,
    hub: Arc<H>,
    ping_interval: Duration,
    write_wait: Duration,
) where
    W: FrameSink,
    M: Serialize + Send + Sync + 'static,
    H: Hub + ?Sized,
{
    let id = writer.id();

    // First ping goes out one full interval after accept
    let mut ping = time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if let Err(e) = writer.send(Frame::ping(), write_wait).await {
                    tracing::error!(connection_id = %id, "Error pinging: {e}");
                    break;
                }
            }
            msg = outbound.recv() => {
                let Some(msg) = msg else {
                    if let Err(e) = writer.send(Frame::Close, write_wait).await {
                        tracing::debug!(connection_id = %id, "Error sending close frame: {e}");
                    }
                    break;
                };
                queued.fetch_sub(1, Ordering::AcqRel);
                if let Err(e) = writer.send_json(&msg, write_wait).await {
                    tracing::error!(connection_id = %id, "Error sending message: {e}");
                    break;
                }
            }
        }
    }

    teardown(id, ping, outbound, writer, hub.as_ref(), write_wait).await;
}

async fn teardown<W, M, H>(
    id: crate::ConnectionId,
    ping: Interval,
    mut outbound: mpsc::Receiver<M>,
    mut writer: ConnectionWriter<W>,
    hub: &H,
    write_wait: Duration,
) where
    W: FrameSink,
    H: Hub + ?Sized,
{
    tracing::info!(connection_id = %id, "Catcher session exiting");
    drop(ping);
    // Producers waiting on a full queue fail instead of blocking forever
    outbound.close();
    // A stalled flush is abandoned after write_wait; deregistration always follows
    writer.close(write_wait).await;
    if !hub.deregister(id).await {
        tracing::debug!(connection_id = %id, "Session was not registered");
    }
}
