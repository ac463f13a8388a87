//! OUT-state transitions: stopping the outbound flow and extending it to
//! keyboards that come online mid-session.

use tracing::{debug, warn};

use input_flow_types::{DeviceHandleId, DeviceId};

use crate::error::CoordinationError;
use crate::sm::StateMachine;

/// Stop an outbound coordination; `target` is the device consuming our
/// input.
pub(crate) fn deactivate(sm: &StateMachine, target: DeviceId) -> Result<(), CoordinationError> {
    let (start_dhid, origin) = {
        let shared = sm.inner.shared.lock().unwrap();
        let start_dhid = shared.start_dhid.clone();
        let origin = start_dhid
            .as_ref()
            .and_then(|d| sm.inner.inventory.origin_device_id(d))
            .unwrap_or_else(|| sm.inner.local_id.clone());
        (start_dhid, origin)
    };
    let dhids = start_dhid
        .map(|d| sm.inner.inventory.coordination_dhids(&d))
        .unwrap_or_default();
    if dhids.is_empty() {
        return Err(CoordinationError::NoDevice);
    }

    let sm = sm.clone();
    tokio::spawn(async move {
        let ok = match sm.inner.bridge.stop(&target, &origin, &dhids).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "stop of outbound flow failed");
                false
            }
        };
        sm.post_stop_finish(ok, target);
    });
    Ok(())
}

/// A keyboard appeared while forwarding; pull it into the live flow. Fire
/// and forget, the session does not depend on the outcome.
pub(crate) fn keyboard_online(
    sm: &StateMachine,
    dhid: DeviceHandleId,
    prepared: Option<(DeviceId, DeviceId)>,
) {
    let Some((source, sink)) = prepared else {
        debug!(dhid = %dhid, "keyboard online with no prepared pair");
        return;
    };
    let bridge = sm.inner.bridge.clone();
    tokio::spawn(async move {
        match bridge.start(&source, &sink, &[dhid]).await {
            Ok(true) => debug!("late keyboard joined the flow"),
            Ok(false) => debug!("late keyboard start refused"),
            Err(e) => debug!(error = %e, "late keyboard start failed"),
        }
    });
}
