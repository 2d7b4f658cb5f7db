//! CPAL output stream and the real-time playback callback.
//!
//! The queue carries samples already interleaved for the device layout
//! (channel remapping happens when buffers are scheduled into the sink),
//! so the callback is a plain non-blocking drain: copy whatever is
//! buffered, convert to the device sample format, and pad the remainder
//! with silence. Underruns are counted, never waited out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, ensure};
use cpal::traits::DeviceTrait;

use crate::queue::SampleQueue;

/// Playback stage tuning and optional counters.
#[derive(Clone, Debug, Default)]
pub struct PlaybackConfig {
    /// Max frames pulled from the queue per refill. Larger values reduce
    /// queue churn but add latency.
    pub refill_max_frames: usize,

    /// While `true` the callback outputs silence without draining the queue,
    /// so pausing never skips ahead.
    pub paused: Option<Arc<AtomicBool>>,

    pub played_frames: Option<Arc<AtomicU64>>,
    pub underrun_frames: Option<Arc<AtomicU64>>,
    pub underrun_events: Option<Arc<AtomicU64>>,
}

/// Build a CPAL output stream fed from `queue`.
///
/// `queue` must carry interleaved `f32` samples at the device sample rate
/// and channel count.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    cfg: PlaybackConfig,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, cfg),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, cfg),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, cfg),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, cfg),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    cfg: PlaybackConfig,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    ensure!(
        queue.channels() == channels,
        "queue carries {} channels but the device expects {channels}",
        queue.channels()
    );

    let refill_max_frames = cfg.refill_max_frames.max(1);
    let queue_cb = queue.clone();
    let paused_flag = cfg.paused.clone();
    let played_frames = cfg.played_frames.clone();
    let underrun_frames = cfg.underrun_frames.clone();
    let underrun_events = cfg.underrun_events.clone();

    // Scratch buffer reused across callbacks; only the callback locks it.
    let scratch: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if let Some(p) = &paused_flag {
                if p.load(Ordering::Relaxed) {
                    data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                    return;
                }
            }

            let mut scratch = scratch.lock().unwrap();
            scratch.resize(data.len(), 0.0);

            let written = fill_from_queue(&queue_cb, &mut scratch, channels, refill_max_frames);

            for (dst, &s) in data[..written].iter_mut().zip(scratch.iter()) {
                *dst = <T as cpal::Sample>::from_sample::<f32>(s);
            }
            for dst in &mut data[written..] {
                *dst = <T as cpal::Sample>::from_sample::<f32>(0.0);
            }

            if written < data.len() {
                if let Some(events) = &underrun_events {
                    events.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(frames) = &underrun_frames {
                    frames.fetch_add(((data.len() - written) / channels) as u64, Ordering::Relaxed);
                }
            }
            if written > 0 {
                if let Some(counter) = &played_frames {
                    counter.fetch_add((written / channels) as u64, Ordering::Relaxed);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Drain whole frames from the queue into `out` without blocking.
///
/// Pulls at most `refill_max_frames` per pop so one callback cannot starve
/// a concurrent producer of the queue lock. Returns samples written;
/// anything past that is the caller's to silence.
fn fill_from_queue(
    queue: &SampleQueue,
    out: &mut [f32],
    channels: usize,
    refill_max_frames: usize,
) -> usize {
    let mut written = 0usize;
    while written < out.len() {
        let want_frames = ((out.len() - written) / channels).min(refill_max_frames);
        if want_frames == 0 {
            break;
        }
        let Some(samples) = queue.pop_frames(want_frames) else {
            break;
        };
        out[written..written + samples.len()].copy_from_slice(&samples);
        written += samples.len();
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_exactly_when_enough_is_buffered() {
        let q = SampleQueue::new(2, 64);
        q.push_latest(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);

        let mut out = [0.0f32; 4];
        let written = fill_from_queue(&q, &mut out, 2, 16);
        assert_eq!(written, 4);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(q.len_frames(), 1);
    }

    #[test]
    fn underrun_leaves_tail_untouched() {
        let q = SampleQueue::new(2, 64);
        q.push_latest(&[0.7, 0.8]);

        let mut out = [9.0f32; 6];
        let written = fill_from_queue(&q, &mut out, 2, 16);
        assert_eq!(written, 2);
        assert_eq!(&out[..2], &[0.7, 0.8]);
        assert_eq!(&out[2..], &[9.0; 4]);
    }

    #[test]
    fn refill_cap_still_fills_the_buffer_across_pops() {
        let q = SampleQueue::new(1, 64);
        q.push_latest(&[1.0, 2.0, 3.0, 4.0]);

        let mut out = [0.0f32; 4];
        let written = fill_from_queue(&q, &mut out, 1, 1);
        assert_eq!(written, 4);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn empty_queue_writes_nothing() {
        let q = SampleQueue::new(2, 16);
        let mut out = [5.0f32; 4];
        assert_eq!(fill_from_queue(&q, &mut out, 2, 8), 0);
        assert_eq!(out, [5.0; 4]);
    }
}
