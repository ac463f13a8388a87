//! Remote input capability bridge.
//!
//! Wraps the platform's remote-input capability behind an async facade. The
//! capability reports outcomes through completions that may arrive late or
//! never; the bridge tracks one pending completion per operation kind and
//! fails it after a bounded grace period so callers always get an answer.

pub mod bridge;
pub mod error;
pub mod mock;

pub use bridge::{
    CompletionHandle, OperationKind, RemoteInputBridge, RemoteInputProvider, DEFAULT_GRACE,
};
pub use error::BridgeError;
