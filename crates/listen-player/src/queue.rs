//! Thread-safe bounded queue for interleaved audio samples.
//!
//! [`SampleQueue`] sits between the session thread (pushing decoded PCM) and
//! the CPAL output callback (draining non-blocking). A live stream never
//! blocks its producer: on overflow the oldest samples are discarded, the
//! listener keeps up with the broadcast instead of drifting behind it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Compute a queue capacity in samples for a `(rate, channels, seconds)`
/// target. Non-finite or non-positive seconds fall back to 2.0.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

/// Bounded queue of interleaved `f32` samples.
///
/// Samples are stored interleaved:
/// `frame0[ch0], frame0[ch1], ..., frame1[ch0], ...`
/// The channel count is fixed for the lifetime of the queue.
pub struct SampleQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_buffered_samples: usize,
    low_watermark_ms: AtomicU64,
}

struct QueueInner {
    queue: VecDeque<f32>,
    closed: bool,
    dropped_samples: u64,
}

impl SampleQueue {
    pub fn new(channels: usize, max_buffered_samples: usize) -> Self {
        Self {
            channels: channels.max(1),
            inner: Mutex::new(QueueInner {
                queue: VecDeque::new(),
                closed: false,
                dropped_samples: 0,
            }),
            cv: Condvar::new(),
            max_buffered_samples: max_buffered_samples.max(channels.max(1)),
            low_watermark_ms: AtomicU64::new(0),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn max_frames(&self) -> usize {
        self.max_buffered_samples / self.channels
    }

    /// Current buffered frames (best-effort snapshot).
    pub fn len_frames(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.queue.len() / self.channels
    }

    /// Remaining capacity in samples (best-effort snapshot).
    pub fn free_samples(&self) -> usize {
        let g = self.inner.lock().unwrap();
        self.max_buffered_samples.saturating_sub(g.queue.len())
    }

    /// Samples discarded so far to keep the queue within bounds.
    pub fn dropped_samples(&self) -> u64 {
        let g = self.inner.lock().unwrap();
        g.dropped_samples
    }

    pub fn is_closed(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.closed
    }

    /// Mark the queue closed and wake all waiters. Idempotent. Closed queues
    /// may still hold samples until the callback drains them.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples without blocking.
    ///
    /// On overflow the oldest samples are evicted to make room; returns the
    /// number of samples evicted. A closed queue drops everything.
    pub fn push_latest(&self, samples: &[f32]) -> usize {
        let mut g = self.inner.lock().unwrap();
        if g.closed {
            return samples.len();
        }

        let mut evicted = 0usize;
        for &s in samples {
            if g.queue.len() >= self.max_buffered_samples {
                g.queue.pop_front();
                evicted += 1;
            }
            g.queue.push_back(s);
        }
        g.dropped_samples += evicted as u64;
        drop(g);
        self.cv.notify_all();
        evicted
    }

    /// Pop up to `max_frames` whole frames without blocking.
    ///
    /// Returns `None` when no full frame is buffered. Safe to call from the
    /// real-time audio callback.
    pub fn pop_frames(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();

        let available_frames = g.queue.len() / self.channels;
        let take_samples = available_frames.min(max_frames) * self.channels;
        if take_samples == 0 {
            return None;
        }

        let mut out = Vec::with_capacity(take_samples);
        for _ in 0..take_samples {
            out.push(g.queue.pop_front().unwrap_or(0.0));
        }

        drop(g);
        self.cv.notify_all();
        self.log_low_watermark();
        Some(out)
    }

    fn log_low_watermark(&self) {
        let threshold = (self.max_buffered_samples / 8).max(self.channels * 16);
        let queued = {
            let g = self.inner.lock().unwrap();
            g.queue.len()
        };
        if queued > 0 && queued < threshold {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_else(|_| Duration::from_millis(0))
                .as_millis() as u64;
            let last = self.low_watermark_ms.load(Ordering::Relaxed);
            if now.saturating_sub(last) > 1000 {
                self.low_watermark_ms.store(now, Ordering::Relaxed);
                tracing::info!(
                    queued_samples = queued,
                    threshold_samples = threshold,
                    "playback queue low watermark"
                );
            }
        }
    }
}

/// Block until `q` is closed and empty, or `cancel` becomes true.
///
/// Returns `true` if the queue drained normally, `false` if cancelled.
pub fn wait_until_drained_or_cancel(q: &Arc<SampleQueue>, cancel: &Arc<AtomicBool>) -> bool {
    let mut g = q.inner.lock().unwrap();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        if g.closed && g.queue.is_empty() {
            return true;
        }
        let (ng, _timeout) = q.cv.wait_timeout(g, Duration::from_millis(50)).unwrap();
        g = ng;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_max_buffered_samples_fallbacks() {
        assert_eq!(calc_max_buffered_samples(48_000, 2, 2.0), 192_000);
        assert_eq!(calc_max_buffered_samples(48_000, 2, -1.0), 192_000);
        assert_eq!(calc_max_buffered_samples(48_000, 2, f32::NAN), 192_000);
    }

    #[test]
    fn pop_returns_none_when_empty() {
        let q = SampleQueue::new(2, 16);
        assert!(q.pop_frames(4).is_none());
    }

    #[test]
    fn pop_returns_whole_frames_in_order() {
        let q = SampleQueue::new(2, 64);
        q.push_latest(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let out = q.pop_frames(2).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        let out = q.pop_frames(8).unwrap();
        assert_eq!(out, vec![5.0, 6.0]);
    }

    #[test]
    fn overflow_evicts_oldest_samples() {
        let q = SampleQueue::new(1, 4);
        assert_eq!(q.push_latest(&[1.0, 2.0, 3.0, 4.0]), 0);
        assert_eq!(q.push_latest(&[5.0, 6.0]), 2);
        assert_eq!(q.dropped_samples(), 2);

        let out = q.pop_frames(8).unwrap();
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn closed_queue_rejects_pushes_but_drains() {
        let q = SampleQueue::new(1, 16);
        q.push_latest(&[1.0, 2.0]);
        q.close();
        q.close();

        assert_eq!(q.push_latest(&[3.0]), 1);
        assert_eq!(q.pop_frames(8).unwrap(), vec![1.0, 2.0]);
        assert!(q.pop_frames(8).is_none());
        assert!(q.is_closed());
    }

    #[test]
    fn free_samples_reflects_headroom() {
        let q = SampleQueue::new(1, 8);
        assert_eq!(q.free_samples(), 8);
        q.push_latest(&[0.0; 5]);
        assert_eq!(q.free_samples(), 3);
    }

    #[test]
    fn wait_until_drained_respects_cancel() {
        let q = Arc::new(SampleQueue::new(1, 16));
        q.push_latest(&[1.0]);
        let cancel = Arc::new(AtomicBool::new(true));
        assert!(!wait_until_drained_or_cancel(&q, &cancel));

        let cancel = Arc::new(AtomicBool::new(false));
        q.close();
        q.pop_frames(8);
        assert!(wait_until_drained_or_cancel(&q, &cancel));
    }
}
