//! Real-time sync over WebSocket.
//!
//! One task per live session runs a blocking read loop; a single
//! registry-owner task serializes registration changes and fan-out. All
//! outbound writes on a connection flow through that session's queue, so at
//! most one writer ever touches a given socket.

mod events;
mod handler;
mod hub;
mod session;

pub use events::{Envelope, EventKind, TaskCreatedEvent, TaskUpdatedEvent};
pub use handler::ws_handler;
pub use hub::ConnectionHub;
pub use session::SessionHandle;
