//! IN-state transitions: come-back to the origin of the active start
//! device, relay toward a third device, and stopping the inbound flow.

use tracing::warn;

use input_flow_types::{DeviceId, InputDeviceId};

use crate::error::CoordinationError;
use crate::sm::StateMachine;

/// Activation while receiving input. Toward the device that started the
/// session this is a come-back; toward anyone else it relays the flow and
/// then cuts the old one.
pub(crate) fn activate(
    sm: &StateMachine,
    remote: &DeviceId,
    start_device: InputDeviceId,
) -> Result<(), CoordinationError> {
    let start_dhid = sm
        .inner
        .shared
        .lock()
        .unwrap()
        .start_dhid
        .clone()
        .ok_or(CoordinationError::NoDevice)?;
    let origin = sm
        .inner
        .inventory
        .origin_device_id(&start_dhid)
        .ok_or(CoordinationError::NoDevice)?;

    if *remote == origin {
        come_back(sm, origin, start_device)
    } else {
        relay(sm, remote.clone(), start_device, origin)
    }
}

/// Stop the remote input we are receiving; completion drives the start
/// finish path, which walks the state back to FREE.
fn come_back(
    sm: &StateMachine,
    origin: DeviceId,
    start_device: InputDeviceId,
) -> Result<(), CoordinationError> {
    let dhids = sm
        .inner
        .shared
        .lock()
        .unwrap()
        .start_dhid
        .clone()
        .map(|d| sm.inner.inventory.coordination_dhids(&d))
        .unwrap_or_default();
    if dhids.is_empty() {
        return Err(CoordinationError::NoDevice);
    }

    let sm = sm.clone();
    tokio::spawn(async move {
        let local = sm.inner.local_id.clone();
        let ok = match sm.inner.bridge.stop(&origin, &local, &dhids).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "stop toward origin failed");
                false
            }
        };
        sm.post_start_finish(ok, origin, start_device);
    });
    Ok(())
}

/// Route the origin's input to a third device, then cut the old leg so the
/// input never flows both ways at once.
fn relay(
    sm: &StateMachine,
    remote: DeviceId,
    start_device: InputDeviceId,
    old_origin: DeviceId,
) -> Result<(), CoordinationError> {
    let sink = sm
        .inner
        .inventory
        .origin_of_input_device(start_device)
        .ok_or(CoordinationError::NoDevice)?;
    let dhids = sm.inner.inventory.coordination_dhids_of(start_device);
    if dhids.is_empty() {
        return Err(CoordinationError::NoDevice);
    }
    let old_dhids = sm
        .inner
        .shared
        .lock()
        .unwrap()
        .start_dhid
        .clone()
        .map(|d| sm.inner.inventory.coordination_dhids(&d))
        .unwrap_or_default();

    let pair = (remote.clone(), sink.clone());
    let need_prepare = {
        let mut shared = sm.inner.shared.lock().unwrap();
        let need = shared.prepared.as_ref() != Some(&pair);
        if need {
            shared.prepared = Some(pair.clone());
        }
        need
    };

    let sm = sm.clone();
    tokio::spawn(async move {
        if need_prepare {
            match sm.inner.bridge.prepare(&remote, &sink).await {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    sm.inner.shared.lock().unwrap().prepared = None;
                    sm.post_start_finish(false, remote, start_device);
                    return;
                }
            }
        }
        let ok = match sm.inner.bridge.start(&remote, &sink, &dhids).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "relay start failed");
                false
            }
        };
        if ok && !old_dhids.is_empty() {
            let local = sm.inner.local_id.clone();
            if let Err(e) = sm.inner.bridge.stop(&old_origin, &local, &old_dhids).await {
                warn!(error = %e, "failed to stop old forwarding after relay");
            }
        }
        sm.post_start_finish(ok, remote, start_device);
    });
    Ok(())
}

/// Stop an inbound coordination; `target` is the device whose input we are
/// receiving.
pub(crate) fn deactivate(sm: &StateMachine, target: DeviceId) -> Result<(), CoordinationError> {
    let dhids = sm
        .inner
        .shared
        .lock()
        .unwrap()
        .start_dhid
        .clone()
        .map(|d| sm.inner.inventory.coordination_dhids(&d))
        .unwrap_or_default();
    if dhids.is_empty() {
        return Err(CoordinationError::NoDevice);
    }

    let sm = sm.clone();
    tokio::spawn(async move {
        let local = sm.inner.local_id.clone();
        let ok = match sm.inner.bridge.stop(&target, &local, &dhids).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "stop of inbound flow failed");
                false
            }
        };
        sm.post_stop_finish(ok, target);
    });
    Ok(())
}
