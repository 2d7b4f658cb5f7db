//! Buffer/playback engine.
//!
//! Decoded chunks enter in arrival order and leave for the sink in the same
//! order. Enqueue never blocks and never fails; submission waits for sink
//! readiness. The pending queue is bounded: on overflow the oldest chunk is
//! dropped (a live stream has no use for stale audio) and the drop is
//! counted and logged.

mod append;
mod schedule;

pub use append::StreamingAppend;
pub use schedule::{DecodeSchedule, PcmSpec};

use std::collections::VecDeque;

use crate::error::SinkError;

/// One decoded audio chunk as handed to the engine.
///
/// `sample_rate`/`channels` are present only on the PCM path; the byte path
/// leaves format discovery to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub payload: Vec<u8>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// What happened to a chunk handed to [`PlaybackStrategy::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The chunk (or an earlier queued one) reached the sink.
    Submitted,
    /// The sink was not ready; the chunk waits in the pending queue.
    Queued,
}

/// Engine tuning parameters.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Max chunks held while the sink is busy; oldest is dropped on overflow.
    pub max_pending: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_pending: 256 }
    }
}

/// Counters describing engine activity, snapshot style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Chunks accepted by `enqueue`.
    pub enqueued: u64,
    /// Buffers handed to the sink.
    pub submitted: u64,
    /// Chunks dropped because the pending queue overflowed.
    pub dropped_overflow: u64,
    /// Chunks whose odd trailing byte was truncated on the PCM path.
    pub truncated: u64,
    /// Total payload bytes handed to the sink.
    pub bytes_submitted: u64,
}

/// One playback strategy: ordered, backpressure-aware chunk submission.
///
/// Implementations share one contract: buffers reach the sink in exact
/// arrival order of the chunks that survived decoding.
pub trait PlaybackStrategy {
    /// Accept one chunk. Non-blocking; always succeeds unless the sink is
    /// already unusable (closed / rejecting), which ends the session.
    fn enqueue(&mut self, chunk: Chunk) -> Result<EnqueueOutcome, SinkError>;

    /// The sink signalled readiness (update complete / unit ended).
    /// Returns whether anything was submitted.
    fn on_sink_ready(&mut self) -> Result<bool, SinkError>;

    /// While paused nothing is submitted; chunks keep queueing.
    fn set_paused(&mut self, paused: bool);

    /// Drop all pending chunks (session teardown).
    fn reset(&mut self);

    /// Chunks currently waiting for the sink.
    fn pending(&self) -> usize;

    fn stats(&self) -> EngineStats;
}

/// Bounded FIFO with drop-oldest overflow, used by both strategies.
pub(crate) struct PendingQueue<T> {
    items: VecDeque<T>,
    max: usize,
}

impl<T> PendingQueue<T> {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max: max.max(1),
        }
    }

    /// Push one item; returns `true` if the oldest entry was evicted.
    pub(crate) fn push(&mut self, item: T) -> bool {
        let evicted = if self.items.len() >= self.max {
            self.items.pop_front();
            true
        } else {
            false
        };
        self.items.push_back(item);
        evicted
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}
