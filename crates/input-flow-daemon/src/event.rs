//! Listener notification channels.
//!
//! Transitions and crossing-switch query answers travel on separate
//! channels so a slow query consumer never delays transition listeners.

use std::sync::Mutex;

use tokio::sync::mpsc;

use input_flow_types::{CoordinationState, DeviceId};

/// A coordination transition or outcome, delivered to subscribed listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    /// A peer asked to coordinate with this device.
    RemoteActivated { peer: DeviceId },
    /// The authoritative state changed.
    StateChanged { state: CoordinationState },
    /// Final outcome of an activation attempt.
    ActivateResult { peer: DeviceId, success: bool },
    /// Final outcome of a deactivation attempt.
    DeactivateResult { peer: DeviceId, success: bool },
    /// The session to a relevant peer was lost and state was reset.
    SessionLost { peer: DeviceId },
}

/// Answer to a crossing-switch query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnswer {
    pub device: DeviceId,
    pub enabled: bool,
}

/// Fan-out of events to any number of subscribers. Closed subscribers are
/// dropped on the next notification.
#[derive(Default)]
pub struct EventManager {
    transition: Mutex<Vec<mpsc::UnboundedSender<CoordinationEvent>>>,
    query: Mutex<Vec<mpsc::UnboundedSender<QueryAnswer>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CoordinationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.transition.lock().unwrap().push(tx);
        rx
    }

    pub fn subscribe_queries(&self) -> mpsc::UnboundedReceiver<QueryAnswer> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.query.lock().unwrap().push(tx);
        rx
    }

    pub fn notify(&self, event: &CoordinationEvent) {
        self.transition
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn notify_query(&self, answer: &QueryAnswer) {
        self.query
            .lock()
            .unwrap()
            .retain(|tx| tx.send(answer.clone()).is_ok());
    }
}
