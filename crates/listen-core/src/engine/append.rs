//! Streaming-append strategy.
//!
//! Feeds raw byte buffers to a buffered-media sink. The sink infers the
//! format from its configured codec; this strategy never inspects payloads.
//! The head of the queue is appended only while the sink is idle and open;
//! each "update complete" signal drains the next buffer.

use tracing::warn;

use crate::engine::{Chunk, EngineStats, EnqueueOutcome, PendingQueue, PlaybackStrategy};
use crate::error::SinkError;
use crate::sink::{ByteSink, SinkReadiness};

pub struct StreamingAppend<S> {
    sink: S,
    pending: PendingQueue<Vec<u8>>,
    paused: bool,
    stats: EngineStats,
}

impl<S: ByteSink> StreamingAppend<S> {
    pub fn new(sink: S, max_pending: usize) -> Self {
        Self {
            sink,
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
                    return Err(SinkError::Closed("media sink closed mid-session".into()));
                }
            }

            // Queue is non-empty, pop cannot fail.
            let Some(buf) = self.pending.pop() else { break };
            self.sink.supply(&buf)?;
            self.stats.submitted += 1;
            self.stats.bytes_submitted += buf.len() as u64;
            submitted_any = true;
        }

        Ok(submitted_any)
    }
}

impl<S: ByteSink> PlaybackStrategy for StreamingAppend<S> {
    fn enqueue(&mut self, chunk: Chunk) -> Result<EnqueueOutcome, SinkError> {
        self.stats.enqueued += 1;
        if self.pending.push(chunk.payload) {
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
