//! Coordination state.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The three coordination states of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum CoordinationState {
    /// No active coordination.
    #[default]
    Free,
    /// This device is the input sink; a remote device is the source.
    In,
    /// This device is the input source; a remote device receives its input.
    Out,
}

impl CoordinationState {
    /// Whether input forwarding is active in either direction.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::In | Self::Out)
    }
}

impl std::fmt::Display for CoordinationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::In => write!(f, "in"),
            Self::Out => write!(f, "out"),
        }
    }
}
