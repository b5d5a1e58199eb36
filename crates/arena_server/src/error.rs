//! Error types for the arena server.
//!
//! Each concern owns its own error enum so callers can match on exactly the
//! failures they are able to handle. Matchmaking errors carry the wire strings
//! clients expect in `{"err": ...}` bodies.

use thiserror::Error;

/// Startup and runtime failures of the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket creation, bind or accept failures.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else that prevents the server from running.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures of the instance pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every slot holds a live, non-stopped instance (or the hinted slot does).
    #[error("no free game slot")]
    NoCapacity,
}

/// Matchmaking outcomes that are reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchmakingError {
    /// Neither the requested region nor a default region is configured.
    #[error("Invalid Region")]
    InvalidRegion,

    /// The pool is saturated and no running instance can take the player.
    #[error("failed finding game")]
    NoAvailableGame,
}

/// Failures while reading a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The assembled bytes are not a valid document of the expected shape.
    #[error("malformed body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The body grew past the configured limit.
    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The peer went away before the last chunk arrived.
    #[error("request aborted: {0}")]
    Aborted(String),
}

/// Errors raised by a game instance while interpreting a client message.
#[derive(Debug, Error)]
pub enum GameError {
    /// The payload could not be understood by the instance.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The message named a player the instance does not know.
    #[error("unknown player {0}")]
    UnknownPlayer(u64),
}
