//! Capability bridge errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("remote input capability rejected the call: {0}")]
    Capability(String),

    #[error("remote input capability unavailable")]
    Unavailable,
}
