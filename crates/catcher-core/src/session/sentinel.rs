//! Read sentinel: keeps the inbound direction drained.

use std::sync::Arc;

use crate::{Frame, FrameStream, Hub, connection::ConnectionReader};

/// Read and discard inbound frames until the read side fails.
///
/// Reads carry no deadline. Pongs are reported to the hub; everything else
/// is dropped. On any error the handle is closed and the task ends without
/// deregistering; the write multiplexer notices on its next write.
pub(super) async fn read_loop<R, H>(
    mut reader: ConnectionReader<R>,
    hub: Arc<H>,
    max_message_size: usize,
) where
    R: FrameStream,
    H: Hub + ?Sized,
{
    let id = reader.id();
    reader.set_read_limit(max_message_size);

    loop {
        match reader.next_frame().await {
            Ok(Frame::Pong(payload)) => hub.on_pong(id, &payload),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %id, "Read side closing: {e}");
                reader.close();
                break;
            }
        }
    }
}
