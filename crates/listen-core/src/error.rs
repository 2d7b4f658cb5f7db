//! Error taxonomy for live listening sessions.
//!
//! Only validation errors cross the public `join` boundary. Transport and
//! sink failures are recovered into a state transition plus a reason string
//! on the session snapshot; chunk decode failures are dropped per-chunk.

use thiserror::Error;

pub use listen_events::ChunkDecodeError;

/// Errors surfaced synchronously from session operations.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("invalid session id: {0}")]
    Validation(String),
}

/// Realtime channel failures. Never propagated past the session; they become
/// `Errored`/`Disconnected` transitions.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel connect failed: {0}")]
    Connect(String),

    #[error("channel send failed: {0}")]
    Send(String),
}

/// Playback sink failures. A closed or rejecting sink halts playback; the
/// caller must rejoin.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("playback sink closed: {0}")]
    Closed(String),

    #[error("playback sink rejected buffer: {0}")]
    Rejected(String),
}
