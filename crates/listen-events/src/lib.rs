//! Wire schema for the live listening channel.
//!
//! The realtime channel delivers JSON messages tagged by an `event` field:
//! - `connect` / `disconnect`: channel lifecycle
//! - `joined`: join acknowledgement with the current listener count
//! - `listener-update`: listener count changes (optionally with the server peak)
//! - `audio-stream`: one audio chunk, base64-encoded, with optional PCM metadata
//! - `ended`: the remote source finished broadcasting
//!
//! Outbound commands are tagged by a `command` field (`join` / `leave`).
//!
//! This crate only defines the schema and payload decoding; session state and
//! playback live in `listen-core`.

pub mod chunk;
pub mod event;

pub use chunk::{ChunkDecodeError, decode_chunk, pcm16le_to_f32, pcm_duration_secs};
pub use event::{ChannelEvent, Command};
