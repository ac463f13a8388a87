//! FREE-state transitions: first activation toward a remote sink, and
//! unchain cleanup of a dangling prepared pair.

use tracing::{debug, warn};

use input_flow_types::{Command, DeviceId, InputDeviceId};

use crate::error::CoordinationError;
use crate::event::CoordinationEvent;
use crate::sm::StateMachine;

/// Prepare the capability pair (unless it is already the prepared one) and
/// start forwarding the coordination devices toward `remote`. The outcome
/// is posted back as a start completion.
pub(crate) fn activate(
    sm: &StateMachine,
    remote: &DeviceId,
    start_device: InputDeviceId,
) -> Result<(), CoordinationError> {
    prepare_and_start(sm, remote.clone(), start_device)
}

pub(crate) fn prepare_and_start(
    sm: &StateMachine,
    remote: DeviceId,
    start_device: InputDeviceId,
) -> Result<(), CoordinationError> {
    let origin = sm
        .inner
        .inventory
        .origin_of_input_device(start_device)
        .ok_or(CoordinationError::NoDevice)?;
    let dhids = sm.inner.inventory.coordination_dhids_of(start_device);
    if dhids.is_empty() {
        return Err(CoordinationError::NoDevice);
    }

    let pair = (remote.clone(), origin.clone());
    let need_prepare = {
        let mut shared = sm.inner.shared.lock().unwrap();
        let need = shared.prepared.as_ref() != Some(&pair);
        if need {
            // Re-prepare replaces the old pair; at most one is ever live
            shared.prepared = Some(pair.clone());
        }
        need
    };

    let sm = sm.clone();
    tokio::spawn(async move {
        if need_prepare {
            match sm.inner.bridge.prepare(&remote, &origin).await {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    sm.inner.shared.lock().unwrap().prepared = None;
                    sm.post_start_finish(false, remote, start_device);
                    return;
                }
            }
        } else {
            debug!(source = %remote, sink = %origin, "pair already prepared");
        }
        let ok = match sm.inner.bridge.start(&remote, &origin, &dhids).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "start operation failed");
                false
            }
        };
        sm.post_start_finish(ok, remote, start_device);
    });
    Ok(())
}

/// Tear down the prepared pair from FREE. With `announce` the stop is our
/// own initiative and the target must hear about it first; without, we are
/// answering the target's unchained stop.
pub(crate) fn deactivate(
    sm: &StateMachine,
    target: DeviceId,
    announce: bool,
) -> Result<(), CoordinationError> {
    let sm = sm.clone();
    tokio::spawn(async move {
        if announce {
            let opened = sm.inner.session.open_session(&target).await;
            let sent = match opened {
                Ok(()) => {
                    sm.inner
                        .session
                        .send_command(
                            &target,
                            Command::Stop {
                                unchained: true,
                                session_id: 0,
                            },
                        )
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                warn!(peer = %target, error = %e, "failed to announce unchain");
            }
        }

        let pair = sm.inner.shared.lock().unwrap().prepared.clone();
        let ok = match &pair {
            Some((source, sink)) => {
                matches!(sm.inner.bridge.unprepare(source, sink).await, Ok(true))
            }
            None => true,
        };
        if ok {
            sm.inner.shared.lock().unwrap().prepared = None;
        }

        let notice = Command::UnchainResult {
            local_device_id: sm.inner.local_id.clone(),
            result: ok,
            session_id: 0,
        };
        if let Err(e) = sm.inner.session.send_command(&target, notice).await {
            warn!(peer = %target, error = %e, "failed to report unchain result");
        }

        {
            let mut shared = sm.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
        }
        sm.inner
            .events
            .notify(&CoordinationEvent::DeactivateResult {
                peer: target,
                success: ok,
            });
    });
    Ok(())
}
