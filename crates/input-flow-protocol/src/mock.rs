//! Mock session port for testing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use input_flow_types::{Command, DeviceId};

use crate::error::ProtocolError;
use crate::session::SessionPort;

/// One recorded outbound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Open(DeviceId),
    Command(DeviceId, Command),
    Start(DeviceId, bool),
    Raw(DeviceId, u32, Vec<u8>),
    Close(DeviceId),
}

#[derive(Debug, Default)]
struct MockSessionState {
    calls: Vec<SessionCall>,
    open: HashSet<DeviceId>,
    fail_open: bool,
    fail_send: bool,
}

/// Mock session port recording everything the coordination service sends.
pub struct MockSession {
    state: Arc<Mutex<MockSessionState>>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockSessionState::default())),
        }
    }

    /// Get a clonable handle for observing and steering the mock from tests.
    pub fn handle(&self) -> MockSessionHandle {
        MockSessionHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for [`MockSession`].
#[derive(Clone)]
pub struct MockSessionHandle {
    state: Arc<Mutex<MockSessionState>>,
}

impl MockSessionHandle {
    /// Get a snapshot of every recorded call, in order.
    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Get a snapshot of the commands sent to `peer`.
    pub fn commands_to(&self, peer: &DeviceId) -> Vec<Command> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|call| match call {
                SessionCall::Command(to, cmd) if to == peer => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_open(&self, peer: &DeviceId) -> bool {
        self.state.lock().unwrap().open.contains(peer)
    }

    /// Make subsequent `open_session` calls fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Make subsequent sends fail.
    pub fn fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }
}

#[async_trait]
impl SessionPort for MockSession {
    async fn open_session(&self, peer: &DeviceId) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SessionCall::Open(peer.clone()));
        if state.fail_open {
            return Err(ProtocolError::Timeout("session open"));
        }
        state.open.insert(peer.clone());
        Ok(())
    }

    async fn send_command(&self, peer: &DeviceId, command: Command) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(SessionCall::Command(peer.clone(), command));
        if state.fail_send {
            return Err(ProtocolError::NoSession(peer.to_string()));
        }
        Ok(())
    }

    async fn send_start(
        &self,
        peer: &DeviceId,
        button_pressed: bool,
    ) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(SessionCall::Start(peer.clone(), button_pressed));
        if state.fail_send {
            return Err(ProtocolError::NoSession(peer.to_string()));
        }
        Ok(())
    }

    async fn send_raw(
        &self,
        peer: &DeviceId,
        tag: u32,
        payload: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(SessionCall::Raw(peer.clone(), tag, payload));
        if state.fail_send {
            return Err(ProtocolError::NoSession(peer.to_string()));
        }
        Ok(())
    }

    async fn close_session(&self, peer: &DeviceId) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SessionCall::Close(peer.clone()));
        state.open.remove(peer);
    }

    async fn has_session(&self, peer: &DeviceId) -> bool {
        self.state.lock().unwrap().open.contains(peer)
    }
}
