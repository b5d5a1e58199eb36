//! # Arena Server
//!
//! The front door of a multiplayer game backend. It serves a small HTTP API,
//! hands clients a game through matchmaking and binds their WebSocket
//! connections to one of a fixed number of running game instances.
//!
//! ## Components
//!
//! * [`pool::GamePool`] - fixed-capacity table of game instances, indexed by
//!   slot id. Slots are created, retired and reused in place.
//! * [`matchmaking::select_game`] - picks an open game for a region, starts a
//!   new one when there is room, or overflows into the newest running match.
//! * [`gateway::Gateway`] - admits `/play` upgrades, binds each connection to
//!   its instance when the socket opens and unbinds it on close.
//! * [`body::ChunkedBody`] - rebuilds JSON request bodies that arrive in
//!   several chunks.
//!
//! The simulation itself is outside this crate. Games plug in through the
//! [`game::GameInstance`] and [`game::GameFactory`] traits; [`game::RelayGame`]
//! is a minimal implementation that echoes payloads between players.
//!
//! ## Concurrency
//!
//! The pool sits behind a single `tokio::sync::Mutex`. Every pool mutation,
//! matchmaking scan and gateway transition takes the lock for its whole
//! duration, so each one observes a stable table. Each WebSocket connection is
//! driven by one task, which keeps `open -> message* -> close` in order.
//!
//! ## Error Handling
//!
//! Failures are reported through `thiserror` enums in [`error`]. None of them
//! take the process down: a failed request gets an error response and a
//! failed connection is closed.

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::GameServer;
pub use utils::{create_server, create_server_with_config};

pub mod body;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod gateway;
pub mod matchmaking;
pub mod pool;
pub mod server;
pub mod utils;

#[cfg(test)]
mod testing;
