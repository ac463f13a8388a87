//! Protocol and transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("no session open to peer {0}")]
    NoSession(String),

    #[error("no registered address for peer {0}")]
    UnknownPeer(String),

    #[error("frame size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("serialisation error: {0}")]
    Serialization(String),

    #[error("deserialisation error: {0}")]
    Deserialization(String),

    #[error("stream closed unexpectedly")]
    StreamClosed,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error(transparent)]
    Quinn(#[from] quinn::ConnectionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
