//! Playback sink abstractions.
//!
//! The engine is platform-agnostic: the hosting environment supplies a
//! concrete sink. Two shapes exist, matching the two playback strategies:
//! a byte-oriented sink that buffers encoded media ranges, and a PCM sink
//! that schedules decoded sample buffers.

use crate::error::SinkError;

/// Whether a sink can accept more data right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkReadiness {
    /// Idle and open: the next buffer may be submitted.
    Ready,
    /// Mid-update or out of headroom: hold the queue until the sink signals
    /// completion.
    Busy,
    /// Closed: no further submissions will ever succeed.
    Closed,
}

/// A sink that accepts appended byte ranges (buffered-media style).
///
/// The host forwards the sink's "update complete" signal to the session as
/// `on_sink_ready`, which drains the next queued buffer.
pub trait ByteSink {
    fn readiness(&self) -> SinkReadiness;

    /// Append one buffer. Must only be called when [`readiness`] is `Ready`.
    ///
    /// [`readiness`]: ByteSink::readiness
    fn supply(&mut self, bytes: &[u8]) -> Result<(), SinkError>;
}

/// One decoded buffer of interleaved normalized samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    /// Frame count (samples divided by channel count).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// A sink that schedules decoded PCM buffers for gapless playback.
///
/// Each scheduled buffer starts exactly when the previous one ends; the sink
/// reports `Busy` while it has no room for another buffer and the host
/// forwards its "unit ended" signal as `on_sink_ready`.
pub trait PcmSink {
    fn readiness(&self) -> SinkReadiness;

    /// Schedule one buffer after everything already scheduled.
    fn schedule(&mut self, buffer: PcmBuffer) -> Result<(), SinkError>;
}
