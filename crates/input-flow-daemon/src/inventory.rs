//! Device inventory collaborator.

use input_flow_types::{DeviceHandleId, DeviceId, InputDeviceId};

/// Read-only view of input peripherals and their hosting devices.
///
/// Queries are synchronous and cheap; the backing inventory keeps its own
/// cache of the mesh. Mocked in tests.
pub trait DeviceInventory: Send + Sync {
    /// The peripheral handle of a local input device, if it exists.
    fn dhid(&self, device: InputDeviceId) -> Option<DeviceHandleId>;

    /// The device currently hosting the given peripheral.
    fn origin_device_id(&self, dhid: &DeviceHandleId) -> Option<DeviceId>;

    /// The hosting device of a local input device.
    fn origin_of_input_device(&self, device: InputDeviceId) -> Option<DeviceId> {
        self.dhid(device).and_then(|d| self.origin_device_id(&d))
    }

    /// The peripheral plus any keyboard sharing its origin; the set of
    /// handles that move together during coordination.
    fn coordination_dhids(&self, dhid: &DeviceHandleId) -> Vec<DeviceHandleId>;

    /// Same, keyed by a local input device id.
    fn coordination_dhids_of(&self, device: InputDeviceId) -> Vec<DeviceHandleId> {
        self.dhid(device)
            .map(|d| self.coordination_dhids(&d))
            .unwrap_or_default()
    }

    /// Whether a pointer peripheral is physically attached locally.
    fn has_local_pointer(&self) -> bool;

    /// The crossing switch of a device: whether it allows coordination.
    fn crossing_switch_state(&self, device: &DeviceId) -> bool;
}
