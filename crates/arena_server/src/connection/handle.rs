//! Outbound half of a live connection.

use super::ConnectionId;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Commands queued for the task that owns the socket.
#[derive(Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Deliver a binary frame to the client.
    Frame(Vec<u8>),
    /// Drop the socket without a close handshake.
    Terminate,
}

/// Cloneable reference to a live connection.
///
/// Sending never blocks: frames are queued on an unbounded channel drained by
/// the connection's own task. Once that task has exited every send fails.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote_addr: SocketAddr,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Creates a handle together with the receiver the socket task drains.
    pub fn new(
        id: ConnectionId,
        remote_addr: SocketAddr,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id,
                remote_addr,
                sender,
            },
            receiver,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Queues a frame. Returns `false` if the connection is already gone.
    pub fn send(&self, data: Vec<u8>) -> bool {
        self.sender.send(Outbound::Frame(data)).is_ok()
    }

    /// Asks the socket task to drop the connection.
    pub fn terminate(&self) {
        let _ = self.sender.send(Outbound::Terminate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_and_termination_are_queued_in_order() {
        let (handle, mut rx) = ConnectionHandle::new(7, "10.0.0.1:4000".parse().unwrap());
        assert_eq!(handle.id(), 7);

        assert!(handle.send(vec![1, 2, 3]));
        handle.terminate();

        assert_eq!(rx.try_recv().unwrap(), Outbound::Frame(vec![1, 2, 3]));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Terminate);
    }

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (handle, rx) = ConnectionHandle::new(1, "10.0.0.1:4000".parse().unwrap());
        drop(rx);
        assert!(!handle.send(vec![0]));
    }
}
