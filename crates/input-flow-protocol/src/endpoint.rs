//! The shared QUIC endpoint.
//!
//! One endpoint carries both roles of the session adapter: it listens for
//! peers dialing in and dials out to configured peers, so a device pair
//! needs exactly one UDP socket per side. Keep-alive pings run on every
//! session; a dead peer surfaces as a closed session, which the adapter
//! turns into a reset.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::Endpoint;
use tracing::debug;

use crate::connection::PeerConnection;
use crate::error::ProtocolError;
use crate::tls;

/// Interval between keep-alive pings on an otherwise idle session.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Sessions with no traffic and no acknowledged keep-alive for this long
/// are torn down.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// The QUIC endpoint sessions are dialed from and accepted on.
#[derive(Clone)]
pub struct SessionEndpoint {
    endpoint: Endpoint,
}

impl SessionEndpoint {
    /// Bind to `addr` with the given PEM identity. The same keep-alive and
    /// idle-timeout settings apply to dialed and accepted sessions alike.
    pub fn bind(addr: SocketAddr, cert_pem: &str, key_pem: &str) -> Result<Self, ProtocolError> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let transport = Arc::new(session_transport_config()?);
        let mut server_config = tls::server_config(cert_pem, key_pem)?;
        server_config.transport = Arc::clone(&transport);
        let mut client_config = tls::client_config_skip_verification()?;
        client_config.transport_config(transport);

        let mut endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ProtocolError::Connection(format!("failed to bind {addr}: {e}")))?;
        endpoint.set_default_client_config(client_config);

        debug!(addr = %addr, "session endpoint bound");
        Ok(Self { endpoint })
    }

    /// Wait for a peer to dial in. Fails once the endpoint is closed.
    pub async fn accept(&self) -> Result<PeerConnection, ProtocolError> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or(ProtocolError::StreamClosed)?;
        let connection = incoming
            .await
            .map_err(|e| ProtocolError::Connection(format!("inbound handshake failed: {e}")))?;
        debug!(remote = %connection.remote_address(), "accepted session");
        Ok(PeerConnection::new(connection))
    }

    /// Dial a peer. `server_name` is only used for SNI; peers are admitted
    /// by device id, not by certificate name.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        server_name: &str,
    ) -> Result<PeerConnection, ProtocolError> {
        let connection = self
            .endpoint
            .connect(addr, server_name)
            .map_err(|e| ProtocolError::Connection(format!("cannot dial {addr}: {e}")))?
            .await
            .map_err(|e| ProtocolError::Connection(format!("handshake with {addr} failed: {e}")))?;
        debug!(remote = %addr, "dialed session");
        Ok(PeerConnection::new(connection))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }

    /// Close every session and stop accepting new ones.
    pub fn close(&self) {
        self.endpoint.close(quinn::VarInt::from_u32(0), b"shutdown");
    }
}

fn session_transport_config() -> Result<quinn::TransportConfig, ProtocolError> {
    let mut config = quinn::TransportConfig::default();
    config.keep_alive_interval(Some(KEEP_ALIVE_INTERVAL));
    config.max_idle_timeout(Some(
        IDLE_TIMEOUT
            .try_into()
            .map_err(|e| ProtocolError::Connection(format!("invalid idle timeout: {e}")))?,
    ));
    Ok(config)
}
