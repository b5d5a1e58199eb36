//! Connection state for the WebSocket gateway.
//!
//! [`ConnectionHandle`] is the cheap, cloneable side of a live socket that
//! game instances and the pool keep around. [`ClientConnection`] is the
//! gateway's private per-connection state.

pub mod client;
pub mod handle;

pub use client::{Binding, ClientConnection};
pub use handle::{ConnectionHandle, Outbound};

/// Type alias for connection identifiers.
///
/// Connection IDs are unique for the lifetime of the process.
pub type ConnectionId = usize;
