//! Coordination core for input-flow.
//!
//! Implements the FREE/IN/OUT state machine for cross-device input
//! coordination, the wiring between the session layer and the remote
//! input capability, and the edge triggers (hot areas) that start a
//! crossing.

pub mod config;
pub mod drag;
pub mod error;
pub mod event;
pub mod hotarea;
pub mod inventory;
pub mod mock;
pub mod pointer;
pub mod service;
pub mod setup;
pub mod sm;

mod state_free;
mod state_in;
mod state_out;

pub use config::Config;
pub use drag::{DragPayload, DragRelay, DRAG_FRAME_TAG};
pub use error::CoordinationError;
pub use event::{CoordinationEvent, EventManager, QueryAnswer};
pub use hotarea::{EdgeSide, HotArea, MouseLocationTracker};
pub use inventory::DeviceInventory;
pub use pointer::PointerPort;
pub use service::CoordinationService;
pub use sm::StateMachine;
