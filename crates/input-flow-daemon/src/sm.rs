//! Coordination state machine.
//!
//! Holds the single authoritative [`CoordinationState`] and drives every
//! transition. All asynchronous entry points (peer commands, capability
//! completions, device hot-plug) post tasks onto one serialized worker so
//! transition logic never races itself; the shared fields stay behind a
//! mutex because read-only queries arrive from arbitrary tasks.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use input_flow_bridge::RemoteInputBridge;
use input_flow_protocol::{ProtocolError, SessionPort};
use input_flow_types::{Command, CoordinationState, DeviceHandleId, DeviceId, InputDeviceId};

use crate::error::CoordinationError;
use crate::event::{CoordinationEvent, EventManager, QueryAnswer};
use crate::hotarea::MouseLocationTracker;
use crate::inventory::DeviceInventory;
use crate::pointer::PointerPort;
use crate::{state_free, state_in, state_out};

#[derive(Default)]
pub(crate) struct SmShared {
    pub(crate) state: CoordinationState,
    pub(crate) starting: bool,
    pub(crate) stopping: bool,
    pub(crate) unchain: bool,
    /// The other device of the active coordination: the source while IN,
    /// the sink while OUT.
    pub(crate) remote_id: Option<DeviceId>,
    /// The peripheral that initiated the active coordination.
    pub(crate) start_dhid: Option<DeviceHandleId>,
    /// The device pair with a live capability session: the remote end
    /// first, then the origin of the forwarded peripherals.
    pub(crate) prepared: Option<(DeviceId, DeviceId)>,
    pub(crate) button_down: bool,
}

pub(crate) enum SmTask {
    StartFinish {
        success: bool,
        remote: DeviceId,
        start_device: InputDeviceId,
    },
    StopFinish {
        success: bool,
        remote: DeviceId,
    },
    Command {
        peer: DeviceId,
        command: Command,
    },
    Reset {
        device: DeviceId,
    },
    KeyboardOnline {
        dhid: DeviceHandleId,
    },
    PointerOffline {
        dhid: DeviceHandleId,
    },
}

pub(crate) struct SmInner {
    pub(crate) local_id: DeviceId,
    pub(crate) session: Arc<dyn SessionPort>,
    pub(crate) bridge: RemoteInputBridge,
    pub(crate) inventory: Arc<dyn DeviceInventory>,
    pub(crate) pointer: Arc<dyn PointerPort>,
    pub(crate) location: Arc<MouseLocationTracker>,
    pub(crate) events: EventManager,
    pub(crate) shared: Mutex<SmShared>,
    task_tx: mpsc::UnboundedSender<SmTask>,
}

/// The coordination state machine. Clone freely; all clones share state.
#[derive(Clone)]
pub struct StateMachine {
    pub(crate) inner: Arc<SmInner>,
}

impl StateMachine {
    pub fn new(
        local_id: DeviceId,
        session: Arc<dyn SessionPort>,
        bridge: RemoteInputBridge,
        inventory: Arc<dyn DeviceInventory>,
        pointer: Arc<dyn PointerPort>,
        location: Arc<MouseLocationTracker>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let sm = Self {
            inner: Arc::new(SmInner {
                local_id,
                session,
                bridge,
                inventory,
                pointer,
                location,
                events: EventManager::new(),
                shared: Mutex::new(SmShared::default()),
                task_tx,
            }),
        };
        sm.spawn_worker(task_rx);
        sm
    }

    fn spawn_worker(&self, mut task_rx: mpsc::UnboundedReceiver<SmTask>) {
        let sm = self.clone();
        tokio::spawn(async move {
            while let Some(task) = task_rx.recv().await {
                sm.handle_task(task).await;
            }
        });
    }

    pub fn local_id(&self) -> &DeviceId {
        &self.inner.local_id
    }

    pub fn current_state(&self) -> CoordinationState {
        self.inner.shared.lock().unwrap().state
    }

    pub fn remote_device(&self) -> Option<DeviceId> {
        self.inner.shared.lock().unwrap().remote_id.clone()
    }

    pub fn start_dhid(&self) -> Option<DeviceHandleId> {
        self.inner.shared.lock().unwrap().start_dhid.clone()
    }

    pub fn prepared_pair(&self) -> Option<(DeviceId, DeviceId)> {
        self.inner.shared.lock().unwrap().prepared.clone()
    }

    pub fn is_starting(&self) -> bool {
        self.inner.shared.lock().unwrap().starting
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.shared.lock().unwrap().stopping
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CoordinationEvent> {
        self.inner.events.subscribe()
    }

    pub fn subscribe_queries(&self) -> mpsc::UnboundedReceiver<QueryAnswer> {
        self.inner.events.subscribe_queries()
    }

    /// Track whether the primary pointer button is held; a button-down
    /// activation makes the peer install an input filter first.
    pub fn set_button_down(&self, down: bool) {
        self.inner.shared.lock().unwrap().button_down = down;
    }

    // -- public entry points -------------------------------------------------

    /// Begin coordinating with `remote_id`, driven by the local input
    /// device `start_device`. The final outcome arrives on the listener
    /// channel once the capability chain completes.
    pub async fn activate_coordination(
        &self,
        remote_id: &DeviceId,
        start_device: InputDeviceId,
    ) -> Result<(), CoordinationError> {
        if remote_id.is_empty() || *remote_id == self.inner.local_id {
            return Err(CoordinationError::ParameterError);
        }
        if self.inner.inventory.dhid(start_device).is_none() {
            return Err(CoordinationError::NoDevice);
        }
        if !self.inner.inventory.crossing_switch_state(remote_id) {
            return Err(CoordinationError::NotAllowed);
        }

        {
            let mut shared = self.inner.shared.lock().unwrap();
            // Starting and stopping are mutually exclusive; an activation
            // during a live deactivation would race its capability stop
            if shared.starting || shared.stopping {
                return Err(CoordinationError::InTransition);
            }
            shared.starting = true;
        }

        if let Err(e) = self.inner.session.open_session(remote_id).await {
            self.inner.shared.lock().unwrap().starting = false;
            return Err(session_error(e));
        }

        let button_down = self.inner.shared.lock().unwrap().button_down;
        if let Err(e) = self.inner.session.send_start(remote_id, button_down).await {
            self.inner.shared.lock().unwrap().starting = false;
            return Err(session_error(e));
        }

        let state = self.current_state();
        let delegated = match state {
            CoordinationState::Free => state_free::activate(self, remote_id, start_device),
            CoordinationState::In => state_in::activate(self, remote_id, start_device),
            CoordinationState::Out => Err(CoordinationError::ParameterError),
        };
        if let Err(e) = delegated {
            self.inner.shared.lock().unwrap().starting = false;
            return Err(e);
        }

        if state == CoordinationState::Free {
            self.inner.shared.lock().unwrap().remote_id = Some(remote_id.clone());
        }
        info!(remote = %remote_id, ?state, "activation in flight");
        Ok(())
    }

    /// End the active coordination. With `unchain`, additionally tear down
    /// the prepared capability pair; from FREE this cleans up a dangling
    /// prepare and is otherwise a no-op.
    pub async fn deactivate_coordination(&self, unchain: bool) -> Result<(), CoordinationError> {
        let (state, remote_id, start_dhid, prepared) = {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.stopping || shared.starting {
                return Err(CoordinationError::InTransition);
            }
            shared.stopping = true;
            shared.unchain = unchain;
            (
                shared.state,
                shared.remote_id.clone(),
                shared.start_dhid.clone(),
                shared.prepared.clone(),
            )
        };

        let target = match state {
            CoordinationState::In => start_dhid
                .as_ref()
                .and_then(|d| self.inner.inventory.origin_device_id(d)),
            CoordinationState::Out => remote_id.or_else(|| prepared.clone().map(|p| p.0)),
            CoordinationState::Free => prepared.clone().map(|p| p.0),
        };
        let Some(target) = target else {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
            // Nothing to stop from FREE
            return if state == CoordinationState::Free {
                Ok(())
            } else {
                Err(CoordinationError::NoDevice)
            };
        };

        if state == CoordinationState::Free && !unchain {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
            return Ok(());
        }

        if state != CoordinationState::Free {
            // Tell the peer before driving the capability stop
            if let Err(e) = self
                .inner
                .session
                .send_command(
                    &target,
                    Command::Stop {
                        unchained: unchain,
                        session_id: 0,
                    },
                )
                .await
            {
                warn!(peer = %target, error = %e, "failed to announce stop");
            }
        }

        let delegated = match state {
            CoordinationState::Free => state_free::deactivate(self, target.clone(), true),
            CoordinationState::In => state_in::deactivate(self, target.clone()),
            CoordinationState::Out => state_out::deactivate(self, target.clone()),
        };
        if let Err(e) = delegated {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
            return Err(e);
        }
        info!(target = %target, ?state, unchain, "deactivation in flight");
        Ok(())
    }

    /// Ask for a device's crossing switch; the answer arrives on the query
    /// channel, never on the transition channel.
    pub fn get_coordination_state(&self, device: &DeviceId) -> Result<(), CoordinationError> {
        if device.is_empty() {
            return Err(CoordinationError::ParameterError);
        }
        let enabled = self.inner.inventory.crossing_switch_state(device);
        self.inner.events.notify_query(&QueryAnswer {
            device: device.clone(),
            enabled,
        });
        Ok(())
    }

    /// Feed an inbound peer command. Dispatched on the worker, never on the
    /// caller's stack.
    pub fn handle_command(&self, peer: DeviceId, command: Command) {
        self.post(SmTask::Command { peer, command });
    }

    /// Session loss notification; resets only if the lost peer is relevant
    /// to the current state. Idempotent.
    pub fn reset(&self, device: DeviceId) {
        self.post(SmTask::Reset { device });
    }

    pub fn on_device_offline(&self, device: DeviceId) {
        self.reset(device);
    }

    pub fn on_keyboard_online(&self, dhid: DeviceHandleId) {
        self.post(SmTask::KeyboardOnline { dhid });
    }

    pub fn on_pointer_offline(&self, dhid: DeviceHandleId) {
        self.post(SmTask::PointerOffline { dhid });
    }

    // -- worker --------------------------------------------------------------

    pub(crate) fn post(&self, task: SmTask) {
        let _ = self.inner.task_tx.send(task);
    }

    pub(crate) fn post_start_finish(
        &self,
        success: bool,
        remote: DeviceId,
        start_device: InputDeviceId,
    ) {
        self.post(SmTask::StartFinish {
            success,
            remote,
            start_device,
        });
    }

    pub(crate) fn post_stop_finish(&self, success: bool, remote: DeviceId) {
        self.post(SmTask::StopFinish { success, remote });
    }

    async fn handle_task(&self, task: SmTask) {
        match task {
            SmTask::StartFinish {
                success,
                remote,
                start_device,
            } => self.on_start_finish(success, remote, start_device).await,
            SmTask::StopFinish { success, remote } => self.on_stop_finish(success, remote).await,
            SmTask::Command { peer, command } => self.on_command(peer, command).await,
            SmTask::Reset { device } => self.on_reset(device),
            SmTask::KeyboardOnline { dhid } => self.handle_keyboard_online(dhid),
            SmTask::PointerOffline { dhid } => self.handle_pointer_offline(dhid).await,
        }
    }

    async fn on_command(&self, peer: DeviceId, command: Command) {
        match command {
            Command::Start { button_pressed, .. } => {
                self.on_remote_start(peer, button_pressed).await;
            }
            Command::StartResult {
                result,
                start_dhid,
                pointer_x_percent,
                pointer_y_percent,
                ..
            } => {
                self.on_remote_start_result(
                    peer,
                    result,
                    start_dhid,
                    pointer_x_percent,
                    pointer_y_percent,
                );
            }
            Command::Stop { unchained, .. } => self.on_remote_stop(peer, unchained).await,
            Command::StopResult { result, .. } => self.on_remote_stop_result(&peer, result),
            Command::StopOtherResult {
                other_device_id, ..
            } => self.on_stop_other_result(&peer, other_device_id),
            Command::UnchainResult { result, .. } => self.on_unchain_result(&peer, result),
            Command::FilterAdded => {
                // Consumed by the session adapter's bounded wait
                debug!(peer = %peer, "filter acknowledged");
            }
        }
    }

    /// Outcome of the local activation's capability chain.
    async fn on_start_finish(&self, success: bool, remote: DeviceId, start_device: InputDeviceId) {
        let (starting, state) = {
            let shared = self.inner.shared.lock().unwrap();
            (shared.starting, shared.state)
        };
        if !starting {
            debug!(remote = %remote, "ignoring stale start completion");
            return;
        }

        let dhid = self.inner.inventory.dhid(start_device);
        if success {
            if let Some(d) = dhid.clone() {
                self.inner.shared.lock().unwrap().start_dhid = Some(d);
            }
        }

        let (x, y) = self.inner.location.percent();
        let result = Command::StartResult {
            result: success,
            start_dhid: dhid.unwrap_or_default(),
            pointer_x_percent: x,
            pointer_y_percent: y,
            session_id: 0,
        };
        if let Err(e) = self.inner.session.send_command(&remote, result).await {
            warn!(peer = %remote, error = %e, "failed to report start result");
        }

        if success {
            match state {
                CoordinationState::Free => {
                    self.update_state(CoordinationState::Out);
                    self.inner.shared.lock().unwrap().remote_id = Some(remote.clone());
                }
                CoordinationState::In => {
                    // A third device took over; tell the old source who
                    let old_source = self.inner.shared.lock().unwrap().remote_id.clone();
                    if let Some(old_source) = old_source {
                        if old_source != remote {
                            let notice = Command::StopOtherResult {
                                other_device_id: remote.clone(),
                                session_id: 0,
                            };
                            if let Err(e) =
                                self.inner.session.send_command(&old_source, notice).await
                            {
                                warn!(peer = %old_source, error = %e, "failed to notify old source");
                            }
                        }
                    }
                    self.update_state(CoordinationState::Free);
                }
                CoordinationState::Out => {
                    info!(remote = %remote, "start finished while already out");
                }
            }
        }

        self.inner.shared.lock().unwrap().starting = false;
        self.inner.events.notify(&CoordinationEvent::ActivateResult {
            peer: remote,
            success,
        });
    }

    /// Outcome of the local deactivation's capability chain.
    async fn on_stop_finish(&self, success: bool, remote: DeviceId) {
        let (stopping, state, unchain) = {
            let shared = self.inner.shared.lock().unwrap();
            (shared.stopping, shared.state, shared.unchain)
        };
        if !stopping {
            debug!(remote = %remote, "ignoring stale stop completion");
            return;
        }

        let result = Command::StopResult {
            result: success,
            session_id: 0,
        };
        if let Err(e) = self.inner.session.send_command(&remote, result).await {
            warn!(peer = %remote, error = %e, "failed to report stop result");
        }

        if success && state.is_active() {
            self.restore_pointer();
            self.update_state(CoordinationState::Free);
        }

        if unchain {
            // Capability teardown owns session closure on this path
            let pair = self.inner.shared.lock().unwrap().prepared.clone();
            let unchained = match &pair {
                Some((source, sink)) => {
                    matches!(self.inner.bridge.unprepare(source, sink).await, Ok(true))
                }
                None => true,
            };
            if unchained {
                self.inner.shared.lock().unwrap().prepared = None;
            }
            let notice = Command::UnchainResult {
                local_device_id: self.inner.local_id.clone(),
                result: unchained,
                session_id: 0,
            };
            if let Err(e) = self.inner.session.send_command(&remote, notice).await {
                warn!(peer = %remote, error = %e, "failed to report unchain result");
            }
        } else {
            self.inner.session.close_session(&remote).await;
        }

        {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
        }
        self.inner
            .events
            .notify(&CoordinationEvent::DeactivateResult {
                peer: remote,
                success,
            });
    }

    /// Inbound START: this device becomes the prospective sink.
    async fn on_remote_start(&self, peer: DeviceId, button_pressed: bool) {
        {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.starting = true;
            shared.remote_id = Some(peer.clone());
        }
        if button_pressed {
            if self.inner.pointer.install_filter() {
                if let Err(e) = self
                    .inner
                    .session
                    .send_command(&peer, Command::FilterAdded)
                    .await
                {
                    warn!(peer = %peer, error = %e, "failed to acknowledge filter");
                }
            } else {
                warn!(peer = %peer, "platform refused the input filter");
            }
        }
        self.inner
            .events
            .notify(&CoordinationEvent::RemoteActivated { peer });
    }

    /// Inbound START_RESULT: the peer finished the start we asked for.
    fn on_remote_start_result(
        &self,
        peer: DeviceId,
        success: bool,
        start_dhid: DeviceHandleId,
        x_percent: i32,
        y_percent: i32,
    ) {
        let (starting, state) = {
            let shared = self.inner.shared.lock().unwrap();
            (shared.starting, shared.state)
        };
        if !starting {
            debug!(peer = %peer, "ignoring stale start result");
            return;
        }

        if !success {
            self.inner.pointer.remove_filter();
            self.inner.shared.lock().unwrap().starting = false;
            self.inner.events.notify(&CoordinationEvent::ActivateResult {
                peer,
                success: false,
            });
            return;
        }

        self.inner.shared.lock().unwrap().start_dhid = Some(start_dhid);
        match state {
            CoordinationState::Free => {
                // Mirror the crossing point onto the opposite edge
                self.inner
                    .pointer
                    .set_location_percent(100 - x_percent, y_percent);
                self.update_state(CoordinationState::In);
            }
            CoordinationState::Out => {
                // Relay come-back observed from the origin side
                self.update_state(CoordinationState::Free);
            }
            CoordinationState::In => {
                debug!(peer = %peer, "start result while already in");
            }
        }
        self.inner.shared.lock().unwrap().starting = false;
        self.inner.events.notify(&CoordinationEvent::ActivateResult {
            peer,
            success: true,
        });
    }

    /// Inbound STOP: the peer wants coordination ended.
    async fn on_remote_stop(&self, peer: DeviceId, unchained: bool) {
        let state = {
            let mut shared = self.inner.shared.lock().unwrap();
            if shared.stopping {
                debug!(peer = %peer, "stop already in flight");
                return;
            }
            shared.stopping = true;
            shared.unchain = unchained;
            shared.state
        };

        let delegated = match state {
            CoordinationState::In => state_in::deactivate(self, peer.clone()),
            CoordinationState::Out => state_out::deactivate(self, peer.clone()),
            CoordinationState::Free => {
                if unchained {
                    state_free::deactivate(self, peer.clone(), false)
                } else {
                    let mut shared = self.inner.shared.lock().unwrap();
                    shared.stopping = false;
                    shared.unchain = false;
                    Ok(())
                }
            }
        };
        if let Err(e) = delegated {
            warn!(peer = %peer, error = %e, "remote stop failed");
            let mut shared = self.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
        }
    }

    /// Inbound STOP_RESULT: the peer finished the stop we asked for.
    fn on_remote_stop_result(&self, peer: &DeviceId, success: bool) {
        let stopping = self.inner.shared.lock().unwrap().stopping;
        if !stopping {
            debug!(peer = %peer, "dropping stop result with no pending stop");
            return;
        }
        if success {
            self.restore_pointer();
            self.update_state(CoordinationState::Free);
        }
        {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.stopping = false;
            shared.unchain = false;
        }
        self.inner
            .events
            .notify(&CoordinationEvent::DeactivateResult {
                peer: peer.clone(),
                success,
            });
    }

    /// Inbound STOP_OTHER_RESULT: a third device took over our old role.
    fn on_stop_other_result(&self, peer: &DeviceId, other: DeviceId) {
        debug!(peer = %peer, other = %other, "coordination handed to another device");
        self.inner.shared.lock().unwrap().remote_id = Some(other);
    }

    fn on_unchain_result(&self, peer: &DeviceId, success: bool) {
        debug!(peer = %peer, success, "unchain result");
        let mut shared = self.inner.shared.lock().unwrap();
        if success {
            shared.prepared = None;
        }
        shared.unchain = false;
    }

    fn on_reset(&self, device: DeviceId) {
        let relevant = {
            let shared = self.inner.shared.lock().unwrap();
            match shared.state {
                CoordinationState::Out => shared.remote_id.as_ref() == Some(&device),
                CoordinationState::In => {
                    shared.remote_id.as_ref() == Some(&device)
                        || shared
                            .start_dhid
                            .clone()
                            .and_then(|d| self.inner.inventory.origin_device_id(&d))
                            .as_ref()
                            == Some(&device)
                }
                CoordinationState::Free => false,
            }
        };
        if !relevant {
            debug!(device = %device, "reset for irrelevant device ignored");
            return;
        }
        info!(device = %device, "resetting after session loss");
        self.full_reset();
        self.inner
            .events
            .notify(&CoordinationEvent::SessionLost { peer: device });
    }

    fn handle_keyboard_online(&self, dhid: DeviceHandleId) {
        let (state, prepared) = {
            let shared = self.inner.shared.lock().unwrap();
            (shared.state, shared.prepared.clone())
        };
        if state != CoordinationState::Out {
            return;
        }
        state_out::keyboard_online(self, dhid, prepared);
    }

    async fn handle_pointer_offline(&self, dhid: DeviceHandleId) {
        let (state, matches, remote) = {
            let shared = self.inner.shared.lock().unwrap();
            (
                shared.state,
                shared.start_dhid.as_ref() == Some(&dhid),
                shared.remote_id.clone(),
            )
        };
        if state == CoordinationState::Free || !matches {
            return;
        }
        if state == CoordinationState::Out {
            if let Some(remote) = remote {
                // Best effort; the reset below is what matters
                let bridge = self.inner.bridge.clone();
                let local = self.inner.local_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = bridge.stop(&remote, &local, &[dhid]).await {
                        debug!(error = %e, "stop after pointer loss failed");
                    }
                });
            }
        }
        info!("start pointer went offline, resetting");
        self.full_reset();
    }

    // -- shared transition helpers -------------------------------------------

    /// Apply a state change: old-state teardown strictly before new-state
    /// setup, so the old and new input paths never overlap.
    pub(crate) fn update_state(&self, new_state: CoordinationState) {
        let old = self.current_state();
        if old == new_state {
            return;
        }

        self.inner.pointer.remove_filter();
        if old == CoordinationState::Out {
            self.inner.pointer.set_visible(true);
        }

        match new_state {
            CoordinationState::Free => {
                let mut shared = self.inner.shared.lock().unwrap();
                shared.state = CoordinationState::Free;
                shared.remote_id = None;
                shared.start_dhid = None;
            }
            CoordinationState::In => {
                self.inner.pointer.install_filter();
                self.inner.shared.lock().unwrap().state = CoordinationState::In;
            }
            CoordinationState::Out => {
                self.inner.pointer.install_filter();
                self.inner.pointer.set_visible(false);
                self.inner.shared.lock().unwrap().state = CoordinationState::Out;
            }
        }
        info!(from = %old, to = %new_state, "state changed");
        self.inner
            .events
            .notify(&CoordinationEvent::StateChanged { state: new_state });
    }

    pub(crate) fn restore_pointer(&self) {
        if self.inner.inventory.has_local_pointer() {
            self.inner.pointer.set_location_percent(50, 50);
            self.inner.pointer.set_visible(true);
        } else {
            self.inner.pointer.set_visible(false);
        }
    }

    /// Unconditional return to FREE: clears both flags, the prepared pair,
    /// and the coordination bookkeeping.
    pub(crate) fn full_reset(&self) {
        self.inner.pointer.remove_filter();
        self.restore_pointer();
        {
            let mut shared = self.inner.shared.lock().unwrap();
            shared.state = CoordinationState::Free;
            shared.starting = false;
            shared.stopping = false;
            shared.unchain = false;
            shared.remote_id = None;
            shared.start_dhid = None;
            shared.prepared = None;
        }
        self.inner.events.notify(&CoordinationEvent::StateChanged {
            state: CoordinationState::Free,
        });
    }
}

fn session_error(e: ProtocolError) -> CoordinationError {
    match e {
        ProtocolError::Timeout(_) => CoordinationError::SessionTimeout,
        other => other.into(),
    }
}
