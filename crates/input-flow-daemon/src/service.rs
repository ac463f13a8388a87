//! Coordination service assembly.
//!
//! Binds the QUIC transport, wires the session adapter into the state
//! machine, and exposes the operations a frontend calls.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use input_flow_bridge::{RemoteInputBridge, RemoteInputProvider};
use input_flow_protocol::{SessionAdapter, SessionEndpoint};
use input_flow_types::{CommandKind, DeviceId, InputDeviceId};

use crate::config::Config;
use crate::drag::{DragPayload, DragRelay};
use crate::error::CoordinationError;
use crate::event::{CoordinationEvent, QueryAnswer};
use crate::hotarea::MouseLocationTracker;
use crate::inventory::DeviceInventory;
use crate::pointer::PointerPort;
use crate::sm::StateMachine;

/// The assembled coordination service.
pub struct CoordinationService {
    sm: StateMachine,
    adapter: SessionAdapter,
    drag: DragRelay,
    drag_rx: Option<mpsc::UnboundedReceiver<DragPayload>>,
    acceptor: tokio::task::JoinHandle<()>,
}

impl CoordinationService {
    /// Bind the transport and wire the state machine to it. `cert_pem` and
    /// `key_pem` come from [`crate::setup::load_or_generate_certs`].
    pub fn start(
        config: &Config,
        cert_pem: &str,
        key_pem: &str,
        provider: Arc<dyn RemoteInputProvider>,
        inventory: Arc<dyn DeviceInventory>,
        pointer: Arc<dyn PointerPort>,
    ) -> Result<Self, CoordinationError> {
        let local_id = DeviceId::new(&config.identity.device_id);
        let bind_addr: SocketAddr = format!("{}:{}", config.daemon.bind, config.daemon.port)
            .parse()
            .map_err(|e| CoordinationError::Config(format!("invalid bind address: {e}")))?;
        let endpoint = SessionEndpoint::bind(bind_addr, cert_pem, key_pem)?;
        info!(addr = %bind_addr, device = %local_id, "coordination service listening");

        let adapter = SessionAdapter::new(local_id.clone(), endpoint);
        for peer in &config.peers {
            match peer.address.parse::<SocketAddr>() {
                Ok(addr) => adapter.add_peer(DeviceId::new(&peer.device_id), addr),
                Err(e) => {
                    warn!(peer = %peer.device_id, error = %e, "skipping peer with bad address");
                }
            }
        }

        let location = Arc::new(MouseLocationTracker::new(
            config.display.width,
            config.display.height,
        ));
        let bridge = RemoteInputBridge::new(provider);
        let sm = StateMachine::new(
            local_id,
            Arc::new(adapter.clone()),
            bridge,
            inventory,
            pointer,
            location,
        );

        register_command_handlers(&adapter, &sm);
        {
            let sm = sm.clone();
            adapter.on_session_closed(Box::new(move |peer| sm.reset(peer)));
        }

        let drag_rx = DragRelay::register_inbound(&adapter);
        let drag = DragRelay::new(Arc::new(adapter.clone()));
        let acceptor = adapter.spawn_acceptor();

        Ok(Self {
            sm,
            adapter,
            drag,
            drag_rx: Some(drag_rx),
            acceptor,
        })
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.sm
    }

    pub fn adapter(&self) -> &SessionAdapter {
        &self.adapter
    }

    pub fn drag(&self) -> &DragRelay {
        &self.drag
    }

    /// Take the inbound drag payload channel. Yields `None` after the first
    /// call.
    pub fn take_drag_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<DragPayload>> {
        self.drag_rx.take()
    }

    pub async fn activate_coordination(
        &self,
        remote_id: &DeviceId,
        start_device: InputDeviceId,
    ) -> Result<(), CoordinationError> {
        self.sm.activate_coordination(remote_id, start_device).await
    }

    pub async fn deactivate_coordination(&self, unchain: bool) -> Result<(), CoordinationError> {
        self.sm.deactivate_coordination(unchain).await
    }

    pub fn get_coordination_state(&self, device: &DeviceId) -> Result<(), CoordinationError> {
        self.sm.get_coordination_state(device)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CoordinationEvent> {
        self.sm.subscribe()
    }

    pub fn subscribe_queries(&self) -> mpsc::UnboundedReceiver<QueryAnswer> {
        self.sm.subscribe_queries()
    }

    pub fn stop(&self) {
        self.acceptor.abort();
    }
}

impl Drop for CoordinationService {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

/// Every inbound command lands on the state machine's worker queue.
fn register_command_handlers(adapter: &SessionAdapter, sm: &StateMachine) {
    let kinds = [
        CommandKind::Start,
        CommandKind::StartResult,
        CommandKind::Stop,
        CommandKind::StopResult,
        CommandKind::StopOtherResult,
        CommandKind::UnchainResult,
        CommandKind::FilterAdded,
    ];
    for kind in kinds {
        let sm = sm.clone();
        adapter.on_command(kind, Box::new(move |peer, command| {
            sm.handle_command(peer, command);
        }));
    }
}
