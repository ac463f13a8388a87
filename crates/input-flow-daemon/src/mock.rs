//! Mock collaborators for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use input_flow_types::{DeviceHandleId, DeviceId, InputDeviceId};

use crate::inventory::DeviceInventory;
use crate::pointer::PointerPort;

// ---------------------------------------------------------------------------
// MockInventory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InventoryState {
    devices: HashMap<InputDeviceId, DeviceHandleId>,
    origins: HashMap<DeviceHandleId, DeviceId>,
    keyboards: HashMap<DeviceId, Vec<DeviceHandleId>>,
    has_pointer: bool,
    switches: HashMap<DeviceId, bool>,
}

/// Mock device inventory populated by tests.
#[derive(Clone)]
pub struct MockInventory {
    state: Arc<Mutex<InventoryState>>,
}

impl Default for MockInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInventory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InventoryState {
                has_pointer: true,
                ..InventoryState::default()
            })),
        }
    }

    /// Register an input device with its peripheral handle and hosting
    /// device.
    pub fn add_device(&self, device: InputDeviceId, dhid: &str, origin: &str) {
        let mut state = self.state.lock().unwrap();
        state.devices.insert(device, DeviceHandleId::new(dhid));
        state
            .origins
            .insert(DeviceHandleId::new(dhid), DeviceId::new(origin));
    }

    /// Register a keyboard hosted by `origin`; it joins every coordination
    /// set rooted at that device.
    pub fn add_keyboard(&self, origin: &str, dhid: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .origins
            .insert(DeviceHandleId::new(dhid), DeviceId::new(origin));
        state
            .keyboards
            .entry(DeviceId::new(origin))
            .or_default()
            .push(DeviceHandleId::new(dhid));
    }

    pub fn set_has_pointer(&self, has: bool) {
        self.state.lock().unwrap().has_pointer = has;
    }

    pub fn set_crossing_switch(&self, device: &str, enabled: bool) {
        self.state
            .lock()
            .unwrap()
            .switches
            .insert(DeviceId::new(device), enabled);
    }
}

impl DeviceInventory for MockInventory {
    fn dhid(&self, device: InputDeviceId) -> Option<DeviceHandleId> {
        self.state.lock().unwrap().devices.get(&device).cloned()
    }

    fn origin_device_id(&self, dhid: &DeviceHandleId) -> Option<DeviceId> {
        self.state.lock().unwrap().origins.get(dhid).cloned()
    }

    fn coordination_dhids(&self, dhid: &DeviceHandleId) -> Vec<DeviceHandleId> {
        let state = self.state.lock().unwrap();
        let mut dhids = vec![dhid.clone()];
        if let Some(origin) = state.origins.get(dhid) {
            if let Some(keyboards) = state.keyboards.get(origin) {
                for kb in keyboards {
                    if kb != dhid {
                        dhids.push(kb.clone());
                    }
                }
            }
        }
        dhids
    }

    fn has_local_pointer(&self) -> bool {
        self.state.lock().unwrap().has_pointer
    }

    fn crossing_switch_state(&self, device: &DeviceId) -> bool {
        self.state
            .lock()
            .unwrap()
            .switches
            .get(device)
            .copied()
            .unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// MockPointer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PointerState {
    visible: bool,
    location: Option<(i32, i32)>,
    filter_installed: bool,
    refuse_filter: bool,
}

/// Mock pointer port recording visibility, placement, and filter state.
#[derive(Clone)]
pub struct MockPointer {
    state: Arc<Mutex<PointerState>>,
}

impl Default for MockPointer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPointer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PointerState {
                visible: true,
                ..PointerState::default()
            })),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().unwrap().visible
    }

    pub fn location(&self) -> Option<(i32, i32)> {
        self.state.lock().unwrap().location
    }

    pub fn filter_installed(&self) -> bool {
        self.state.lock().unwrap().filter_installed
    }

    /// Make subsequent `install_filter` calls fail.
    pub fn refuse_filter(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_filter = refuse;
    }
}

impl PointerPort for MockPointer {
    fn set_visible(&self, visible: bool) {
        self.state.lock().unwrap().visible = visible;
    }

    fn set_location_percent(&self, x: i32, y: i32) {
        self.state.lock().unwrap().location = Some((x, y));
    }

    fn install_filter(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.refuse_filter {
            return false;
        }
        state.filter_installed = true;
        true
    }

    fn remove_filter(&self) {
        self.state.lock().unwrap().filter_installed = false;
    }
}
