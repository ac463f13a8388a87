//! Mock remote input provider for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use input_flow_types::{DeviceHandleId, DeviceId};

use crate::bridge::{CompletionHandle, OperationKind, RemoteInputProvider};
use crate::error::BridgeError;

/// How the mock answers an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Resolve the completion immediately with the given outcome.
    CompleteWith(bool),
    /// Keep the completion; tests resolve it later via
    /// [`MockRemoteInputHandle::resolve_held`].
    Hold,
    /// Reject the call synchronously.
    FailSync,
}

/// One recorded provider invocation.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub kind: OperationKind,
    pub remote: DeviceId,
    pub origin: DeviceId,
    pub dhids: Vec<DeviceHandleId>,
}

#[derive(Default)]
struct MockState {
    behavior: HashMap<OperationKind, MockBehavior>,
    calls: Vec<ProviderCall>,
    held: HashMap<OperationKind, CompletionHandle>,
}

/// Mock capability provider; defaults to immediate success on every call.
pub struct MockRemoteInput {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRemoteInput {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteInput {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Get a clonable handle for steering and observing the mock.
    pub fn handle(&self) -> MockRemoteInputHandle {
        MockRemoteInputHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn invoke(
        &self,
        kind: OperationKind,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
        done: CompletionHandle,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall {
            kind,
            remote: remote.clone(),
            origin: origin.clone(),
            dhids: dhids.to_vec(),
        });
        let behavior = state
            .behavior
            .get(&kind)
            .copied()
            .unwrap_or(MockBehavior::CompleteWith(true));
        match behavior {
            MockBehavior::CompleteWith(outcome) => {
                drop(state);
                done.resolve(outcome);
                Ok(())
            }
            MockBehavior::Hold => {
                state.held.insert(kind, done);
                Ok(())
            }
            MockBehavior::FailSync => Err(BridgeError::Capability("mock failure".to_string())),
        }
    }
}

/// Clonable observer handle for [`MockRemoteInput`].
#[derive(Clone)]
pub struct MockRemoteInputHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockRemoteInputHandle {
    pub fn set_behavior(&self, kind: OperationKind, behavior: MockBehavior) {
        self.state.lock().unwrap().behavior.insert(kind, behavior);
    }

    /// Get a snapshot of all recorded calls, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Resolve a completion previously kept by [`MockBehavior::Hold`].
    /// Does nothing if no completion of that kind is held.
    pub fn resolve_held(&self, kind: OperationKind, success: bool) {
        let held = self.state.lock().unwrap().held.remove(&kind);
        if let Some(done) = held {
            done.resolve(success);
        }
    }
}

#[async_trait]
impl RemoteInputProvider for MockRemoteInput {
    async fn prepare(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        done: CompletionHandle,
    ) -> Result<(), BridgeError> {
        self.invoke(OperationKind::Prepare, remote, origin, &[], done)
    }

    async fn unprepare(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        done: CompletionHandle,
    ) -> Result<(), BridgeError> {
        self.invoke(OperationKind::Unprepare, remote, origin, &[], done)
    }

    async fn start(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
        done: CompletionHandle,
    ) -> Result<(), BridgeError> {
        self.invoke(OperationKind::Start, remote, origin, dhids, done)
    }

    async fn stop(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
        done: CompletionHandle,
    ) -> Result<(), BridgeError> {
        self.invoke(OperationKind::Stop, remote, origin, dhids, done)
    }
}
