//! Per-connection gateway state.

use super::ConnectionHandle;
use crate::game::PlayerId;
use crate::pool::SlotId;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

/// Identifies the instance a connection was bound to.
///
/// The generation pins the binding to one specific instance, so a connection
/// bound before its slot was retired and refilled never touches the newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub player: PlayerId,
    pub generation: u64,
}

/// State the gateway carries for one upgraded connection.
///
/// Created when the upgrade is accepted, bound once when the socket opens,
/// and consumed when the socket closes.
#[derive(Debug)]
pub struct ClientConnection {
    /// The slot this connection asked for, after clamping
    pub game_id: SlotId,

    /// Outbound side of the socket
    pub handle: ConnectionHandle,

    /// Set by the open event when the slot still existed
    pub binding: Option<Binding>,

    /// When the upgrade was accepted
    pub connected_at: SystemTime,
}

impl ClientConnection {
    pub fn new(game_id: SlotId, handle: ConnectionHandle) -> Self {
        Self {
            game_id,
            handle,
            binding: None,
            connected_at: SystemTime::now(),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.handle.remote_addr()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Time since the upgrade was accepted. Zero if the clock went backwards.
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed().unwrap_or_default()
    }
}
