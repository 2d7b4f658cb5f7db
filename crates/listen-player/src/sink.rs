//! PCM sink backed by the shared sample queue.
//!
//! [`CpalSink`] is the bridge between the session engine and the CPAL
//! callback: `schedule` remaps each buffer to the device channel layout and
//! pushes it into the queue; readiness reflects queue headroom so the
//! engine holds chunks instead of evicting freshly scheduled audio.

use std::sync::Arc;

use listen_core::{PcmBuffer, PcmSink, SinkError, SinkReadiness};
use tracing::warn;

use crate::queue::SampleQueue;

pub struct CpalSink {
    queue: Arc<SampleQueue>,
    sample_rate: u32,
    /// Minimum free samples before reporting `Ready` again.
    min_headroom: usize,
    rate_mismatch_warned: bool,
}

impl CpalSink {
    pub fn new(queue: Arc<SampleQueue>, sample_rate: u32) -> Self {
        let min_headroom = (queue.max_frames() * queue.channels() / 4).max(queue.channels());
        Self {
            queue,
            sample_rate,
            min_headroom,
            rate_mismatch_warned: false,
        }
    }

    /// Remap interleaved samples to the queue's (device) channel layout.
    ///
    /// Stereo folds to mono by averaging; anything else clamps each output
    /// channel to the nearest source channel, which duplicates mono across
    /// wider layouts.
    fn remap(&self, buffer: &PcmBuffer) -> Result<Vec<f32>, SinkError> {
        let src = buffer.channels as usize;
        let dst = self.queue.channels();
        if src == 0 {
            return Err(SinkError::Rejected("zero-channel buffer".to_string()));
        }
        if src == dst {
            return Ok(buffer.samples.clone());
        }

        let frames = buffer.samples.len() / src;
        let mut out = Vec::with_capacity(frames * dst);
        for frame in buffer.samples.chunks_exact(src) {
            if src == 2 && dst == 1 {
                out.push(0.5 * (frame[0] + frame[1]));
            } else {
                for ch in 0..dst {
                    out.push(frame[ch.min(src - 1)]);
                }
            }
        }
        Ok(out)
    }
}

impl PcmSink for CpalSink {
    fn readiness(&self) -> SinkReadiness {
        if self.queue.is_closed() {
            SinkReadiness::Closed
        } else if self.queue.free_samples() < self.min_headroom {
            SinkReadiness::Busy
        } else {
            SinkReadiness::Ready
        }
    }

    fn schedule(&mut self, buffer: PcmBuffer) -> Result<(), SinkError> {
        if self.queue.is_closed() {
            return Err(SinkError::Closed("sample queue closed".to_string()));
        }

        // No resampler on the live path; a mismatched source plays at the
        // device rate with a pitch shift, which beats stalling the stream.
        if buffer.sample_rate != self.sample_rate && !self.rate_mismatch_warned {
            self.rate_mismatch_warned = true;
            warn!(
                chunk_rate = buffer.sample_rate,
                device_rate = self.sample_rate,
                "chunk sample rate differs from device rate"
            );
        }

        let samples = self.remap(&buffer)?;
        let evicted = self.queue.push_latest(&samples);
        if evicted > 0 {
            warn!(evicted, "sample queue overflow while scheduling");
        }
        Ok(())
    }
}
