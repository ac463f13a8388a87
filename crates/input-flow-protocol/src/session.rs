//! Peer session adapter.
//!
//! Maintains at most one session per peer device, keyed by device id, and
//! dispatches inbound frames to handlers registered by command kind or raw
//! tag. Session ids are resolved from the live session at send time, so a
//! command never carries the id of a session that has since been replaced.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use input_flow_types::{Command, CommandKind, DeviceId};

use crate::connection::{MessageReceiver, MessageSender, PeerConnection};
use crate::endpoint::SessionEndpoint;
use crate::error::ProtocolError;
use crate::wire::Frame;

/// Bounded wait for a session to open.
pub const SESSION_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded wait for the sink's input-filter acknowledgement after a
/// button-down start.
pub const FILTER_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub type CommandHandler = Box<dyn Fn(DeviceId, Command) + Send + Sync>;
pub type RawHandler = Box<dyn Fn(DeviceId, u32, Vec<u8>) + Send + Sync>;
pub type SessionClosedHandler = Box<dyn Fn(DeviceId) + Send + Sync>;

/// Outbound surface of the session adapter, as seen by the coordination
/// service. Mocked in tests.
#[async_trait]
pub trait SessionPort: Send + Sync {
    /// Open a session to `peer`. Idempotent: succeeds immediately when a
    /// session is already established.
    async fn open_session(&self, peer: &DeviceId) -> Result<(), ProtocolError>;

    /// Send a command over the open session, stamping it with the current
    /// session id.
    async fn send_command(&self, peer: &DeviceId, command: Command) -> Result<(), ProtocolError>;

    /// Send a start command. When `button_pressed` is set, blocks until the
    /// peer acknowledges its input filter or the bounded wait elapses.
    async fn send_start(&self, peer: &DeviceId, button_pressed: bool)
        -> Result<(), ProtocolError>;

    /// Send an opaque passthrough payload, routed on the far side by `tag`.
    async fn send_raw(&self, peer: &DeviceId, tag: u32, payload: Vec<u8>)
        -> Result<(), ProtocolError>;

    /// Tear down the session to `peer`, if any.
    async fn close_session(&self, peer: &DeviceId);

    async fn has_session(&self, peer: &DeviceId) -> bool;
}

struct PeerSession {
    session_id: i32,
    connection: PeerConnection,
    sender: Arc<Mutex<MessageSender>>,
}

struct Inner {
    local_id: DeviceId,
    endpoint: SessionEndpoint,
    peers: StdMutex<HashMap<DeviceId, SocketAddr>>,
    sessions: Mutex<HashMap<DeviceId, PeerSession>>,
    /// Per-peer open locks: concurrent opens to the same peer collapse into
    /// one handshake without blocking traffic to other peers.
    opening: StdMutex<HashMap<DeviceId, Arc<Mutex<()>>>>,
    handlers: StdMutex<HashMap<CommandKind, CommandHandler>>,
    raw_handlers: StdMutex<HashMap<u32, RawHandler>>,
    closed_handler: StdMutex<Option<SessionClosedHandler>>,
    filter_notify: Notify,
    next_session_id: AtomicI32,
}

/// QUIC-backed implementation of [`SessionPort`].
#[derive(Clone)]
pub struct SessionAdapter {
    inner: Arc<Inner>,
}

impl SessionAdapter {
    pub fn new(local_id: DeviceId, endpoint: SessionEndpoint) -> Self {
        Self {
            inner: Arc::new(Inner {
                local_id,
                endpoint,
                peers: StdMutex::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
                opening: StdMutex::new(HashMap::new()),
                handlers: StdMutex::new(HashMap::new()),
                raw_handlers: StdMutex::new(HashMap::new()),
                closed_handler: StdMutex::new(None),
                filter_notify: Notify::new(),
                next_session_id: AtomicI32::new(1),
            }),
        }
    }

    pub fn local_id(&self) -> &DeviceId {
        &self.inner.local_id
    }

    /// Register the network address of a peer device.
    pub fn add_peer(&self, peer: DeviceId, addr: SocketAddr) {
        self.inner.peers.lock().unwrap().insert(peer, addr);
    }

    /// Register a handler for inbound commands of one kind. Replaces any
    /// previous handler for that kind.
    pub fn on_command(&self, kind: CommandKind, handler: CommandHandler) {
        self.inner.handlers.lock().unwrap().insert(kind, handler);
    }

    /// Register a handler for inbound raw frames with the given tag.
    pub fn on_raw(&self, tag: u32, handler: RawHandler) {
        self.inner.raw_handlers.lock().unwrap().insert(tag, handler);
    }

    /// Register the handler invoked when a peer session goes away.
    pub fn on_session_closed(&self, handler: SessionClosedHandler) {
        *self.inner.closed_handler.lock().unwrap() = Some(handler);
    }

    /// The id of the live session to `peer`, if one is open.
    pub async fn session_id(&self, peer: &DeviceId) -> Option<i32> {
        self.inner
            .sessions
            .lock()
            .await
            .get(peer)
            .map(|s| s.session_id)
    }

    /// Spawn the task that accepts inbound sessions for the lifetime of the
    /// endpoint.
    pub fn spawn_acceptor(&self) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let connection = match inner.endpoint.accept().await {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(error = %e, "acceptor stopping");
                        break;
                    }
                };
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    if let Err(e) = accept_session(inner, connection).await {
                        warn!(error = %e, "inbound session rejected");
                    }
                });
            }
        })
    }

    async fn install_session(
        inner: &Arc<Inner>,
        peer: DeviceId,
        connection: PeerConnection,
        sender: MessageSender,
        receiver: MessageReceiver,
    ) -> i32 {
        let session_id = inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = PeerSession {
            session_id,
            connection,
            sender: Arc::new(Mutex::new(sender)),
        };
        if let Some(old) = inner.sessions.lock().await.insert(peer.clone(), session) {
            debug!(peer = %peer, "replacing existing session");
            old.connection.close();
        }
        spawn_reader(Arc::clone(inner), peer, session_id, receiver);
        session_id
    }
}

async fn accept_session(
    inner: Arc<Inner>,
    connection: PeerConnection,
) -> Result<(), ProtocolError> {
    let (sender, mut receiver) = connection.accept_session_stream().await?;

    // The first frame on every session names the initiating peer.
    let peer = match receiver.recv().await? {
        Some(Frame::Announce(peer)) => peer,
        Some(other) => {
            return Err(ProtocolError::Deserialization(format!(
                "expected announce, got {other:?}"
            )));
        }
        None => return Err(ProtocolError::StreamClosed),
    };

    let session_id =
        SessionAdapter::install_session(&inner, peer.clone(), connection, sender, receiver).await;
    info!(peer = %peer, session_id, "accepted inbound session");
    Ok(())
}

fn spawn_reader(inner: Arc<Inner>, peer: DeviceId, session_id: i32, mut receiver: MessageReceiver) {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(Some(frame)) => dispatch(&inner, &peer, frame),
                Ok(None) => break,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "session read failed");
                    break;
                }
            }
        }

        // Only reap the session this reader belongs to; a newer session for
        // the same peer may have replaced it.
        let mut sessions = inner.sessions.lock().await;
        let lost = match sessions.get(&peer) {
            Some(s) if s.session_id == session_id => {
                sessions.remove(&peer);
                true
            }
            _ => false,
        };
        drop(sessions);

        if lost {
            info!(peer = %peer, session_id, "session closed");
            let handler = inner.closed_handler.lock().unwrap();
            if let Some(handler) = handler.as_ref() {
                handler(peer.clone());
            }
        }
    });
}

fn dispatch(inner: &Arc<Inner>, peer: &DeviceId, frame: Frame) {
    match frame {
        Frame::Announce(_) => {}
        Frame::Command(command) => {
            if command.kind() == CommandKind::FilterAdded {
                inner.filter_notify.notify_waiters();
            }
            let handlers = inner.handlers.lock().unwrap();
            if let Some(handler) = handlers.get(&command.kind()) {
                handler(peer.clone(), command);
            } else {
                debug!(peer = %peer, kind = ?command.kind(), "no handler for command");
            }
        }
        Frame::Raw { tag, payload, .. } => {
            let handlers = inner.raw_handlers.lock().unwrap();
            if let Some(handler) = handlers.get(&tag) {
                handler(peer.clone(), tag, payload);
            } else {
                debug!(peer = %peer, tag, "no handler for raw frame");
            }
        }
    }
}

#[async_trait]
impl SessionPort for SessionAdapter {
    async fn open_session(&self, peer: &DeviceId) -> Result<(), ProtocolError> {
        if self.inner.sessions.lock().await.contains_key(peer) {
            return Ok(());
        }

        // Serialize opens per peer only; the session map stays unlocked
        // during the handshake so traffic to other peers never stalls
        // behind one slow open.
        let open_lock = {
            let mut opening = self.inner.opening.lock().unwrap();
            Arc::clone(opening.entry(peer.clone()).or_default())
        };
        let _open_guard = open_lock.lock().await;

        if self.inner.sessions.lock().await.contains_key(peer) {
            return Ok(());
        }

        let addr = self
            .inner
            .peers
            .lock()
            .unwrap()
            .get(peer)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownPeer(peer.to_string()))?;

        let open = async {
            let connection = self.inner.endpoint.connect(addr, "localhost").await?;
            let (mut sender, receiver) = connection.open_session_stream().await?;
            sender
                .send(&Frame::Announce(self.inner.local_id.clone()))
                .await?;
            Ok::<_, ProtocolError>((connection, sender, receiver))
        };
        let (connection, sender, receiver) = tokio::time::timeout(SESSION_OPEN_TIMEOUT, open)
            .await
            .map_err(|_| ProtocolError::Timeout("session open"))??;

        let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = PeerSession {
            session_id,
            connection,
            sender: Arc::new(Mutex::new(sender)),
        };
        self.inner.sessions.lock().await.insert(peer.clone(), session);

        spawn_reader(Arc::clone(&self.inner), peer.clone(), session_id, receiver);
        info!(peer = %peer, session_id, "opened session");
        Ok(())
    }

    async fn send_command(&self, peer: &DeviceId, command: Command) -> Result<(), ProtocolError> {
        let (sender, session_id) = {
            let sessions = self.inner.sessions.lock().await;
            let session = sessions
                .get(peer)
                .ok_or_else(|| ProtocolError::NoSession(peer.to_string()))?;
            (Arc::clone(&session.sender), session.session_id)
        };

        let frame = Frame::Command(command.with_session_id(session_id));
        let mut sender = sender.lock().await;
        sender.send(&frame).await
    }

    async fn send_start(
        &self,
        peer: &DeviceId,
        button_pressed: bool,
    ) -> Result<(), ProtocolError> {
        let command = Command::Start {
            local_device_id: self.inner.local_id.clone(),
            session_id: 0,
            button_pressed,
        };

        if button_pressed {
            // Arm the waiter before sending so the acknowledgement cannot
            // race past us.
            let notified = self.inner.filter_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            self.send_command(peer, command).await?;
            tokio::time::timeout(FILTER_WAIT_TIMEOUT, notified)
                .await
                .map_err(|_| ProtocolError::Timeout("input filter acknowledgement"))?;
        } else {
            self.send_command(peer, command).await?;
        }
        Ok(())
    }

    async fn send_raw(
        &self,
        peer: &DeviceId,
        tag: u32,
        payload: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let sender = {
            let sessions = self.inner.sessions.lock().await;
            let session = sessions
                .get(peer)
                .ok_or_else(|| ProtocolError::NoSession(peer.to_string()))?;
            Arc::clone(&session.sender)
        };

        let frame = Frame::raw(tag, payload)?;
        let mut sender = sender.lock().await;
        sender.send(&frame).await
    }

    async fn close_session(&self, peer: &DeviceId) {
        let removed = self.inner.sessions.lock().await.remove(peer);
        if let Some(session) = removed {
            debug!(peer = %peer, session_id = session.session_id, "closing session");
            session.connection.close();
        }
    }

    async fn has_session(&self, peer: &DeviceId) -> bool {
        self.inner.sessions.lock().await.contains_key(peer)
    }
}
