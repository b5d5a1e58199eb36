//! Reassembly of request bodies that arrive in several chunks.
//!
//! [`ChunkedBody`] is the synchronous core: feed it chunks, then finish it
//! into a typed value. [`read_json`] drives it from any chunk stream, such as
//! an axum request body. Finishing consumes the assembler, so a request can
//! produce at most one outcome.

use crate::error::BodyError;
use axum::body::Bytes;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::fmt::Display;

enum Assembled {
    Empty,
    Single(Bytes),
    Joined(Vec<u8>),
}

/// Accumulates body chunks up to a byte limit.
pub struct ChunkedBody {
    assembled: Assembled,
    len: usize,
    limit: usize,
}

impl ChunkedBody {
    pub fn new(limit: usize) -> Self {
        Self {
            assembled: Assembled::Empty,
            len: 0,
            limit,
        }
    }

    /// Bytes received so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one chunk.
    ///
    /// The first chunk is kept as is. A copy only happens once a second chunk
    /// shows up.
    pub fn push(&mut self, chunk: Bytes) -> Result<(), BodyError> {
        self.len += chunk.len();
        if self.len > self.limit {
            return Err(BodyError::TooLarge { limit: self.limit });
        }

        self.assembled = match std::mem::replace(&mut self.assembled, Assembled::Empty) {
            Assembled::Empty => Assembled::Single(chunk),
            Assembled::Single(first) => {
                let mut joined = Vec::with_capacity(first.len() + chunk.len());
                joined.extend_from_slice(&first);
                joined.extend_from_slice(&chunk);
                Assembled::Joined(joined)
            }
            Assembled::Joined(mut joined) => {
                joined.extend_from_slice(&chunk);
                Assembled::Joined(joined)
            }
        };
        Ok(())
    }

    /// Parses everything received as JSON.
    pub fn finish<T: DeserializeOwned>(self) -> Result<T, BodyError> {
        let parsed = match &self.assembled {
            Assembled::Empty => serde_json::from_slice(&[]),
            Assembled::Single(bytes) => serde_json::from_slice(bytes),
            Assembled::Joined(bytes) => serde_json::from_slice(bytes),
        };
        Ok(parsed?)
    }
}

/// Reads a whole chunk stream and parses it as `T`.
///
/// A stream error means the peer went away mid-body and yields
/// [`BodyError::Aborted`]. Accumulation stops at the first error.
pub async fn read_json<T, S, E>(stream: S, limit: usize) -> Result<T, BodyError>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = ChunkedBody::new(limit);
    futures::pin_mut!(stream);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BodyError::Aborted(e.to_string()))?;
        body.push(chunk)?;
    }
    body.finish()
}
