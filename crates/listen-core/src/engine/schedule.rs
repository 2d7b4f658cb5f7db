//! Decode-and-schedule strategy.
//!
//! Converts raw 16-bit PCM chunks into normalized `f32` buffers and
//! schedules them back-to-back on a PCM sink. Chunks carrying no format
//! metadata fall back to the spec configured at construction; an odd
//! trailing byte is truncated and logged, never an error.

use listen_events::pcm16le_to_f32;
use tracing::warn;

use crate::engine::{Chunk, EngineStats, EnqueueOutcome, PendingQueue, PlaybackStrategy};
use crate::error::SinkError;
use crate::sink::{PcmBuffer, PcmSink, SinkReadiness};

/// Fallback PCM format when chunks carry no metadata.
#[derive(Debug, Clone, Copy)]
pub struct PcmSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
        }
    }
}

pub struct DecodeSchedule<S> {
    sink: S,
    default_spec: PcmSpec,
    pending: PendingQueue<PcmBuffer>,
    paused: bool,
    stats: EngineStats,
}

impl<S: PcmSink> DecodeSchedule<S> {
    pub fn new(sink: S, default_spec: PcmSpec, max_pending: usize) -> Self {
        Self {
            sink,
            default_spec,
            pending: PendingQueue::new(max_pending),
            paused: false,
            stats: EngineStats::default(),
        }
    }

    fn drain(&mut self) -> Result<bool, SinkError> {
        let mut submitted_any = false;

        while !self.paused && self.pending.len() > 0 {
            match self.sink.readiness() {
                SinkReadiness::Ready => {}
                SinkReadiness::Busy => break,
                SinkReadiness::Closed => {
                    return Err(SinkError::Closed("pcm sink closed mid-session".into()));
                }
            }

            let Some(buffer) = self.pending.pop() else { break };
            let bytes = buffer.samples.len() as u64 * 4;
            self.sink.schedule(buffer)?;
            self.stats.submitted += 1;
            self.stats.bytes_submitted += bytes;
            submitted_any = true;
        }

        Ok(submitted_any)
    }
}

impl<S: PcmSink> PlaybackStrategy for DecodeSchedule<S> {
    fn enqueue(&mut self, chunk: Chunk) -> Result<EnqueueOutcome, SinkError> {
        self.stats.enqueued += 1;

        let (samples, truncated) = pcm16le_to_f32(&chunk.payload);
        if truncated {
            self.stats.truncated += 1;
            warn!(
                payload_len = chunk.payload.len(),
                "odd-length PCM chunk, truncated trailing byte"
            );
        }

        let buffer = PcmBuffer {
            samples,
            sample_rate: chunk.sample_rate.unwrap_or(self.default_spec.sample_rate),
            channels: chunk.channels.unwrap_or(self.default_spec.channels),
        };

        if self.pending.push(buffer) {
            self.stats.dropped_overflow += 1;
            warn!(
                dropped_total = self.stats.dropped_overflow,
                "pending chunk queue full, dropped oldest buffer"
            );
        }

        if self.drain()? {
            Ok(EnqueueOutcome::Submitted)
        } else {
            Ok(EnqueueOutcome::Queued)
        }
    }

    fn on_sink_ready(&mut self) -> Result<bool, SinkError> {
        self.drain()
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn reset(&mut self) {
        self.pending.clear();
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn stats(&self) -> EngineStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakePcmSink {
        scheduled: Rc<RefCell<Vec<PcmBuffer>>>,
        readiness: Rc<RefCell<SinkReadiness>>,
        busy_after_schedule: bool,
    }

    impl PcmSink for FakePcmSink {
        fn readiness(&self) -> SinkReadiness {
            *self.readiness.borrow()
        }

        fn schedule(&mut self, buffer: PcmBuffer) -> Result<(), SinkError> {
            self.scheduled.borrow_mut().push(buffer);
            if self.busy_after_schedule {
                *self.readiness.borrow_mut() = SinkReadiness::Busy;
            }
            Ok(())
        }
    }

    fn sink(
        busy_after_schedule: bool,
    ) -> (FakePcmSink, Rc<RefCell<Vec<PcmBuffer>>>, Rc<RefCell<SinkReadiness>>) {
        let scheduled = Rc::new(RefCell::new(Vec::new()));
        let readiness = Rc::new(RefCell::new(SinkReadiness::Ready));
        let s = FakePcmSink {
            scheduled: scheduled.clone(),
            readiness: readiness.clone(),
            busy_after_schedule,
        };
        (s, scheduled, readiness)
    }

    fn pcm_chunk(samples: &[i16], rate: Option<u32>, channels: Option<u16>) -> Chunk {
        let mut payload = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            payload.extend_from_slice(&s.to_le_bytes());
        }
        Chunk {
            payload,
            sample_rate: rate,
            channels,
        }
    }

    #[test]
    fn decodes_and_schedules_normalized_samples() {
        let (s, scheduled, _r) = sink(false);
        let mut engine = DecodeSchedule::new(s, PcmSpec::default(), 16);

        let outcome = engine
            .enqueue(pcm_chunk(&[0, 16384, -16384], Some(44_100), Some(1)))
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Submitted);

        let got = scheduled.borrow();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].sample_rate, 44_100);
        assert_eq!(got[0].channels, 1);
        assert_eq!(got[0].samples, vec![0.0, 0.5, -0.5]);
    }

    #[test]
    fn missing_metadata_uses_default_spec() {
        let (s, scheduled, _r) = sink(false);
        let spec = PcmSpec {
            sample_rate: 22_050,
            channels: 2,
        };
        let mut engine = DecodeSchedule::new(s, spec, 16);

        engine.enqueue(pcm_chunk(&[1, 2], None, None)).unwrap();
        let got = scheduled.borrow();
        assert_eq!(got[0].sample_rate, 22_050);
        assert_eq!(got[0].channels, 2);
    }

    #[test]
    fn odd_byte_chunk_is_truncated_and_still_scheduled() {
        let (s, scheduled, _r) = sink(false);
        let mut engine = DecodeSchedule::new(s, PcmSpec::default(), 16);

        let mut chunk = pcm_chunk(&[100, -100], Some(48_000), Some(1));
        chunk.payload.push(0xAB);
        engine.enqueue(chunk).unwrap();

        let got = scheduled.borrow();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].samples.len(), 2);
        assert_eq!(engine.stats().truncated, 1);
    }

    #[test]
    fn gapless_chaining_waits_for_unit_end() {
        let (s, scheduled, readiness) = sink(true);
        let mut engine = DecodeSchedule::new(s, PcmSpec::default(), 16);

        engine.enqueue(pcm_chunk(&[1], None, None)).unwrap();
        assert_eq!(
            engine.enqueue(pcm_chunk(&[2], None, None)).unwrap(),
            EnqueueOutcome::Queued
        );
        assert_eq!(scheduled.borrow().len(), 1);

        // Current unit finished playing.
        *readiness.borrow_mut() = SinkReadiness::Ready;
        assert!(engine.on_sink_ready().unwrap());
        assert_eq!(scheduled.borrow().len(), 2);
    }

    #[test]
    fn closed_sink_surfaces_error() {
        let (s, _scheduled, readiness) = sink(false);
        *readiness.borrow_mut() = SinkReadiness::Closed;
        let mut engine = DecodeSchedule::new(s, PcmSpec::default(), 16);

        let err = engine.enqueue(pcm_chunk(&[1], None, None)).unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
    }
}
