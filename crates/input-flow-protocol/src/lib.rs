//! QUIC session layer and wire protocol for input-flow.
//!
//! This crate handles QUIC connection management (via quinn), frame
//! serialisation/deserialisation (via bincode v2), and the peer session
//! adapter that the coordination service talks through.

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod mock;
pub mod session;
pub mod tls;
pub mod wire;

pub use connection::{MessageReceiver, MessageSender, PeerConnection};
pub use endpoint::SessionEndpoint;
pub use error::ProtocolError;
pub use session::{SessionAdapter, SessionPort};
pub use wire::Frame;
