//! Coordination errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("another coordination transition is in flight")]
    InTransition,

    #[error("no such input device")]
    NoDevice,

    #[error("invalid device parameter")]
    ParameterError,

    #[error("peer session did not open in time")]
    SessionTimeout,

    #[error("remote input capability failed: {0}")]
    CapabilityFailure(String),

    #[error("policy denied the cross-device operation")]
    NotAllowed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] input_flow_protocol::ProtocolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<input_flow_bridge::BridgeError> for CoordinationError {
    fn from(e: input_flow_bridge::BridgeError) -> Self {
        Self::CapabilityFailure(e.to_string())
    }
}
