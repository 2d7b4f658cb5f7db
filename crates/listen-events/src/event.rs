//! Inbound channel events and outbound commands.
//!
//! Field names follow the wire (camelCase); event/command tags are kebab-case.

use serde::{Deserialize, Serialize};

/// One inbound message from the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChannelEvent {
    /// Channel established.
    Connect,
    /// Join acknowledged by the remote source.
    #[serde(rename_all = "camelCase")]
    Joined { current_listeners: u32 },
    /// Concurrent listener count changed.
    #[serde(rename_all = "camelCase")]
    ListenerUpdate {
        current_listeners: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        peak_listeners: Option<u32>,
    },
    /// One audio chunk. `audio_chunk` is base64; `sample_rate`/`channels`
    /// are present only when the payload is raw PCM.
    #[serde(rename_all = "camelCase")]
    AudioStream {
        audio_chunk: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sample_rate: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channels: Option<u16>,
    },
    /// The remote source ended the broadcast.
    Ended,
    /// Channel closed (remote hangup or network loss).
    Disconnect,
}

/// One outbound command to the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    Join { session_id: String },
    #[serde(rename_all = "camelCase")]
    Leave { session_id: String },
}
