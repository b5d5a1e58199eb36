//! The seam between the front door and the game simulation.
//!
//! The server never looks inside a running match. It only needs the handful
//! of lifecycle facts exposed by [`GameInstance`] and a way to hand a bound
//! connection to the instance and get a player handle back.

use crate::connection::ConnectionHandle;
use crate::error::GameError;
use crate::pool::SlotId;
use std::fmt;
use std::time::Duration;

pub mod relay;

pub use relay::{RelayGame, RelayGameFactory};

/// Handle for a player inside one game instance.
///
/// Player ids are only meaningful to the instance that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A running match occupying one pool slot.
///
/// Implementations own their simulation state. The pool and the gateway only
/// read the lifecycle flags and forward player traffic. None of these methods
/// may block; they are called while the pool lock is held.
pub trait GameInstance: Send {
    /// The match has concluded. Over instances are never offered to joiners.
    fn is_over(&self) -> bool;

    /// The instance has torn itself down and its slot may be reused.
    fn is_stopped(&self) -> bool;

    /// Policy gate for new joiners, independent of capacity.
    fn allow_join(&self) -> bool;

    /// Current joinable population, compared against the per-game capacity.
    fn alive_count(&self) -> usize;

    /// Registers a freshly opened connection and returns its player handle.
    fn add_player(&mut self, connection: ConnectionHandle) -> PlayerId;

    /// Interprets one raw client payload.
    fn handle_message(&mut self, player: PlayerId, data: &[u8]) -> Result<(), GameError>;

    /// Forgets a player whose connection closed.
    fn remove_player(&mut self, player: PlayerId);

    /// Advances the simulation by `dt`.
    fn tick(&mut self, _dt: Duration) {}

    /// Called once when the slot is retired.
    fn stop(&mut self) {}
}

/// Builds new instances for the pool.
pub trait GameFactory: Send + Sync {
    fn create(&self, id: SlotId) -> Box<dyn GameInstance>;
}

impl<F> GameFactory for F
where
    F: Fn(SlotId) -> Box<dyn GameInstance> + Send + Sync,
{
    fn create(&self, id: SlotId) -> Box<dyn GameInstance> {
        self(id)
    }
}
