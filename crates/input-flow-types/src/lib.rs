//! Shared types for input-flow.
//!
//! Identifier newtypes for devices and peripherals, the coordination state
//! enum, and the tagged command protocol exchanged between peers.

pub mod command;
pub mod device;
pub mod state;

pub use command::{Command, CommandKind};
pub use device::{DeviceHandleId, DeviceId, InputDeviceId};
pub use state::CoordinationState;
