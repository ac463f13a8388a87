//! Device identifier types.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Opaque identifier for a device on the local mesh.
///
/// Stable and case-sensitive. Never empty for a real device; an empty id is
/// only ever a "no device" placeholder in cleared state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct DeviceId(String);

impl DeviceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a physical input peripheral (mouse/keyboard),
/// independent of which device currently hosts it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct DeviceHandleId(String);

impl DeviceHandleId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for DeviceHandleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for DeviceHandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric id of an input device as reported by the local input subsystem.
///
/// Only meaningful on the device that assigned it; translated to a
/// [`DeviceHandleId`] through the device inventory before crossing the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct InputDeviceId(pub i32);

impl std::fmt::Display for InputDeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_roundtrip() {
        let id = DeviceId::new("device-a");
        let config = bincode::config::standard();
        let bytes = bincode::encode_to_vec(&id, config).unwrap();
        let (decoded, _): (DeviceId, _) = bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(id, decoded);
    }

    #[test]
    fn device_id_case_sensitive() {
        assert_ne!(DeviceId::new("Device"), DeviceId::new("device"));
    }

    #[test]
    fn empty_id_is_placeholder() {
        assert!(DeviceId::default().is_empty());
        assert!(DeviceHandleId::default().is_empty());
        assert!(!DeviceHandleId::new("dhid-1").is_empty());
    }

    #[test]
    fn device_id_serde_roundtrip() {
        let id = DeviceId::new("device-b");
        let json = serde_json::to_string(&id).unwrap();
        let decoded: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, decoded);
    }
}
