//! Peer command protocol.
//!
//! Commands travel between peers inside a tagged envelope; each variant has
//! a stable integer tag so both ends can register dispatch handlers by kind.
//! Pointer coordinates are carried as percentages of the source display so
//! the sink can mirror the crossing point regardless of resolution.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::device::{DeviceHandleId, DeviceId};

/// Stable integer tag of each command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[repr(u32)]
pub enum CommandKind {
    Start = 1,
    StartResult = 2,
    Stop = 3,
    StopResult = 4,
    StopOtherResult = 5,
    UnchainResult = 6,
    FilterAdded = 7,
}

/// A coordination command exchanged between two peers.
///
/// `session_id` is always resolved from the sender's current session map at
/// send time, never cached across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Command {
    /// Source asks the sink to begin coordination.
    Start {
        local_device_id: DeviceId,
        session_id: i32,
        /// Whether the primary pointer button is held on the source. When
        /// true the sink must install an input filter and reply
        /// `FilterAdded` before the gesture can complete.
        button_pressed: bool,
    },

    /// Sink reports the outcome of a start back to the source.
    StartResult {
        result: bool,
        start_dhid: DeviceHandleId,
        /// Pointer position on the sender's display, 0..=100.
        pointer_x_percent: i32,
        pointer_y_percent: i32,
        session_id: i32,
    },

    /// Request to stop coordination. `unchained` additionally requests
    /// teardown of the prepared capability session.
    Stop { unchained: bool, session_id: i32 },

    /// Outcome of a stop.
    StopResult { result: bool, session_id: i32 },

    /// A third device took over; tells the original origin which one.
    StopOtherResult {
        other_device_id: DeviceId,
        session_id: i32,
    },

    /// Outcome of an unchain teardown.
    UnchainResult {
        local_device_id: DeviceId,
        result: bool,
        session_id: i32,
    },

    /// Bare signal: the sink installed its input filter.
    FilterAdded,
}

impl Command {
    /// The stable tag of this command.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Start { .. } => CommandKind::Start,
            Self::StartResult { .. } => CommandKind::StartResult,
            Self::Stop { .. } => CommandKind::Stop,
            Self::StopResult { .. } => CommandKind::StopResult,
            Self::StopOtherResult { .. } => CommandKind::StopOtherResult,
            Self::UnchainResult { .. } => CommandKind::UnchainResult,
            Self::FilterAdded => CommandKind::FilterAdded,
        }
    }

    /// Rewrite the embedded session id. Called by the session adapter just
    /// before serializing, with the id of the session actually used.
    #[must_use]
    pub fn with_session_id(mut self, id: i32) -> Self {
        match &mut self {
            Self::Start { session_id, .. }
            | Self::StartResult { session_id, .. }
            | Self::Stop { session_id, .. }
            | Self::StopResult { session_id, .. }
            | Self::StopOtherResult { session_id, .. }
            | Self::UnchainResult { session_id, .. } => *session_id = id,
            Self::FilterAdded => {}
        }
        self
    }

    /// The embedded session id, if the variant carries one.
    #[must_use]
    pub fn session_id(&self) -> Option<i32> {
        match self {
            Self::Start { session_id, .. }
            | Self::StartResult { session_id, .. }
            | Self::Stop { session_id, .. }
            | Self::StopResult { session_id, .. }
            | Self::StopOtherResult { session_id, .. }
            | Self::UnchainResult { session_id, .. } => Some(*session_id),
            Self::FilterAdded => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bincode_roundtrip(cmd: &Command) -> Command {
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(cmd, config).unwrap();
        let (decoded, _): (Command, _) = bincode::decode_from_slice(&bytes, config).unwrap();
        decoded
    }

    #[test]
    fn start_roundtrip() {
        let cmd = Command::Start {
            local_device_id: DeviceId::new("device-a"),
            session_id: 7,
            button_pressed: true,
        };
        assert_eq!(bincode_roundtrip(&cmd), cmd);
        assert_eq!(cmd.kind(), CommandKind::Start);
    }

    #[test]
    fn start_result_roundtrip() {
        let cmd = Command::StartResult {
            result: true,
            start_dhid: DeviceHandleId::new("dhid-mouse"),
            pointer_x_percent: 98,
            pointer_y_percent: 40,
            session_id: 3,
        };
        assert_eq!(bincode_roundtrip(&cmd), cmd);
    }

    #[test]
    fn stop_carries_unchain_flag() {
        let cmd = Command::Stop {
            unchained: true,
            session_id: 1,
        };
        match bincode_roundtrip(&cmd) {
            Command::Stop { unchained, .. } => assert!(unchained),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn filter_added_has_no_session_id() {
        let cmd = Command::FilterAdded;
        assert_eq!(cmd.session_id(), None);
        assert_eq!(cmd.kind(), CommandKind::FilterAdded);
        assert_eq!(bincode_roundtrip(&cmd), cmd);
    }

    #[test]
    fn with_session_id_rewrites() {
        let cmd = Command::Stop {
            unchained: false,
            session_id: 0,
        };
        assert_eq!(cmd.with_session_id(42).session_id(), Some(42));
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            CommandKind::Start,
            CommandKind::StartResult,
            CommandKind::Stop,
            CommandKind::StopResult,
            CommandKind::StopOtherResult,
            CommandKind::UnchainResult,
            CommandKind::FilterAdded,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
