//! Drag payload relay.
//!
//! While a pointer drag crosses devices, the drag payload (file lists,
//! selection data) travels on the same session as the coordination
//! commands, on its own frame tag so the command channel stays typed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use input_flow_protocol::{SessionAdapter, SessionPort};
use input_flow_types::DeviceId;

use crate::error::CoordinationError;

/// Frame tag for drag payloads. Disjoint from the command tags.
pub const DRAG_FRAME_TAG: u32 = 100;

/// Payload from a peer's in-flight drag.
#[derive(Debug, Clone)]
pub struct DragPayload {
    pub peer: DeviceId,
    pub data: Vec<u8>,
}

/// Sends and receives drag payloads over an established session.
#[derive(Clone)]
pub struct DragRelay {
    session: Arc<dyn SessionPort>,
}

impl DragRelay {
    pub fn new(session: Arc<dyn SessionPort>) -> Self {
        Self { session }
    }

    /// Forward a drag payload to `peer`. The session must already be open;
    /// drags only happen mid-coordination.
    pub async fn send(&self, peer: &DeviceId, data: Vec<u8>) -> Result<(), CoordinationError> {
        debug!(peer = %peer, len = data.len(), "sending drag payload");
        self.session
            .send_raw(peer, DRAG_FRAME_TAG, data)
            .await
            .map_err(CoordinationError::from)
    }

    /// Register the inbound side on `adapter`; payloads arrive on the
    /// returned channel.
    pub fn register_inbound(adapter: &SessionAdapter) -> mpsc::UnboundedReceiver<DragPayload> {
        let (tx, rx) = mpsc::unbounded_channel();
        adapter.on_raw(
            DRAG_FRAME_TAG,
            Box::new(move |peer, _tag, data| {
                if tx.send(DragPayload { peer, data }).is_err() {
                    warn!("drag receiver dropped, payload discarded");
                }
            }),
        );
        rx
    }
}
