//! Wire format: length-prefixed bincode v2 frames.
//!
//! Each frame on the wire is:
//!   [4 bytes big-endian length][bincode v2 payload]
//!
//! Command frames are small and capped at 4 KiB; raw frames carry bulk
//! passthrough data and are capped at 1 MiB.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use input_flow_types::{Command, DeviceId};

use crate::error::ProtocolError;

/// Maximum encoded size of a command frame.
pub const MAX_COMMAND_SIZE: usize = 4 * 1024;

/// Maximum encoded size of any frame. Prevents allocation bombs.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// A frame exchanged over a peer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Frame {
    /// First frame on every outbound stream; identifies the sender so the
    /// acceptor can key the session.
    Announce(DeviceId),

    /// A coordination command.
    Command(Command),

    /// Opaque passthrough payload, routed by tag. `payload_len` is carried
    /// explicitly and must match the payload length on decode.
    Raw {
        tag: u32,
        payload_len: u32,
        payload: Vec<u8>,
    },
}

impl Frame {
    /// Build a raw frame with a consistent length field.
    pub fn raw(tag: u32, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        let payload_len = u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        })?;
        Ok(Self::Raw {
            tag,
            payload_len,
            payload,
        })
    }

    fn size_limit(&self) -> usize {
        match self {
            Self::Announce(_) | Self::Command(_) => MAX_COMMAND_SIZE,
            Self::Raw { .. } => MAX_FRAME_SIZE,
        }
    }
}

/// Encode a frame to a length-prefixed byte vector.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let config = bincode::config::standard();
    let payload = bincode::encode_to_vec(frame, config)
        .map_err(|e| ProtocolError::Serialization(e.to_string()))?;

    let max = frame.size_limit();
    if payload.len() > max {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| ProtocolError::Serialization("frame too large".to_string()))?;

    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a frame from a bincode v2 payload (without the length prefix).
pub fn decode_frame(payload: &[u8]) -> Result<Frame, ProtocolError> {
    let config = bincode::config::standard();
    let (frame, _): (Frame, _) = bincode::decode_from_slice(payload, config)
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;

    if let Frame::Raw {
        payload_len,
        payload,
        ..
    } = &frame
    {
        if *payload_len as usize != payload.len() {
            return Err(ProtocolError::Deserialization(format!(
                "raw frame length field {payload_len} does not match payload length {}",
                payload.len()
            )));
        }
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use input_flow_types::DeviceHandleId;

    #[test]
    fn encode_decode_roundtrip() {
        let frame = Frame::Command(Command::StartResult {
            result: true,
            start_dhid: DeviceHandleId::new("dhid-1"),
            pointer_x_percent: 2,
            pointer_y_percent: 60,
            session_id: 9,
        });

        let bytes = encode_frame(&frame).unwrap();
        // First 4 bytes are length
        let len = u32::from_be_bytes(bytes[..4].try_into().unwrap());
        assert_eq!(len as usize, bytes.len() - 4);

        let decoded = decode_frame(&bytes[4..]).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn announce_roundtrip() {
        let frame = Frame::Announce(DeviceId::new("peer-a"));
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&bytes[4..]).unwrap(), frame);
    }

    #[test]
    fn raw_frame_length_field_must_match() {
        let frame = Frame::Raw {
            tag: 1,
            payload_len: 3,
            payload: vec![0xAA; 8],
        };
        let config = bincode::config::standard();
        let payload = bincode::encode_to_vec(&frame, config).unwrap();
        let err = decode_frame(&payload).unwrap_err();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }

    #[test]
    fn oversized_raw_frame_rejected() {
        let frame = Frame::raw(2, vec![0u8; MAX_FRAME_SIZE + 1]).unwrap();
        let err = encode_frame(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { .. }));
    }

    #[test]
    fn raw_constructor_sets_length() {
        let frame = Frame::raw(7, vec![1, 2, 3]).unwrap();
        match frame {
            Frame::Raw {
                tag, payload_len, ..
            } => {
                assert_eq!(tag, 7);
                assert_eq!(payload_len, 3);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
