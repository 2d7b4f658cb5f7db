//! Listen — a small CLI that replays a captured live-session event
//! transcript (NDJSON, one channel event per line) through the session
//! state machine and plays the audio via CPAL.
//!
//! ## Pipeline
//! 1. **Replay**: transcript lines are parsed into channel events and fed to
//!    the session, paced by chunk duration unless `--fast` is set.
//! 2. **Session**: the state machine decodes chunks and submits them to the
//!    playback engine in arrival order.
//! 3. **Playback**: the CPAL callback pulls samples from a bounded queue
//!    without blocking and writes them to the device.
//!
//! `--dry-run` swaps the device for an accounting sink and prints a summary.

mod cli;
mod config;
mod replay;

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{Receiver, bounded};
use listen_core::{DecodeSchedule, EngineConfig, LiveSession, PcmSpec, PlaybackStrategy, SessionState};
use listen_player::device;
use listen_player::playback::{PlaybackConfig, build_output_stream};
use listen_player::queue::{SampleQueue, calc_max_buffered_samples, wait_until_drained_or_cancel};
use listen_player::sink::CpalSink;
use tracing_subscriber::EnvFilter;

/// Resolved settings: flags override config file values.
struct Settings {
    session_id: String,
    device: Option<String>,
    rate: u32,
    channels: u16,
    buffer_seconds: f32,
    refill_max_frames: usize,
    max_pending: usize,
}

impl Settings {
    fn resolve(args: &cli::Args, cfg: &config::ListenConfig) -> Self {
        Self {
            session_id: args
                .session_id
                .clone()
                .or_else(|| cfg.session_id.clone())
                .unwrap_or_else(|| "local".to_string()),
            device: args.device.clone().or_else(|| cfg.device.clone()),
            rate: args.rate.or(cfg.sample_rate).unwrap_or(48_000),
            channels: args.channels.or(cfg.channels).unwrap_or(1),
            buffer_seconds: args.buffer_seconds.or(cfg.buffer_seconds).unwrap_or(2.0),
            refill_max_frames: args.refill_max_frames,
            max_pending: args
                .max_pending
                .or(cfg.max_pending)
                .unwrap_or_else(|| EngineConfig::default().max_pending),
        }
    }
}

/// Live audio output kept alive for the duration of the replay.
struct DeviceOutput {
    queue: Arc<SampleQueue>,
    _stream: cpal::Stream,
    played_frames: Arc<AtomicU64>,
    underrun_events: Arc<AtomicU64>,
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,listen=info")),
        )
        .init();

    if args.list_devices {
        let host = cpal::default_host();
        return device::list_devices(&host);
    }

    let file_cfg = match &args.config {
        Some(path) => config::ListenConfig::load(path)?,
        None => config::ListenConfig::default(),
    };
    let settings = Settings::resolve(&args, &file_cfg);

    let cancel = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let cancel_sig = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_sig.store(true, Ordering::SeqCst);
        let _ = shutdown_tx.try_send(());
    })
    .context("install signal handler")?;

    let reader: Box<dyn BufRead> = match args.capture.as_deref() {
        None => Box::new(std::io::stdin().lock()),
        Some(path) if path.as_os_str() == "-" => Box::new(std::io::stdin().lock()),
        Some(path) => Box::new(std::io::BufReader::new(
            std::fs::File::open(path).with_context(|| format!("open capture {:?}", path))?,
        )),
    };

    let connector = replay::ReplayConnector::new();
    let spec = PcmSpec {
        sample_rate: settings.rate,
        channels: settings.channels,
    };

    if args.dry_run {
        let sink = replay::DiscardSink::new();
        let frames = sink.frame_counter();
        let engine = DecodeSchedule::new(sink, spec, settings.max_pending);
        let mut session = session_with_logging(Box::new(connector), Box::new(engine));

        session.join(&settings.session_id)?;
        run_transcript(&mut session, reader, &settings, args.fast, &shutdown_rx)?;

        print_summary(&session, frames.load(Ordering::Relaxed), settings.rate, None);
        return Ok(());
    }

    let (engine, output) = open_device_output(&settings)?;
    let mut session = session_with_logging(Box::new(connector), engine);

    session.join(&settings.session_id)?;
    let interrupted = run_transcript(&mut session, reader, &settings, args.fast, &shutdown_rx)?;

    // Let buffered audio finish unless the user already asked to stop.
    output.queue.close();
    if !interrupted {
        wait_until_drained_or_cancel(&output.queue, &cancel);
    }

    tracing::info!(
        played_frames = output.played_frames.load(Ordering::Relaxed),
        underrun_events = output.underrun_events.load(Ordering::Relaxed),
        "playback finished"
    );
    print_summary(
        &session,
        output.played_frames.load(Ordering::Relaxed),
        settings.rate,
        Some(output.underrun_events.load(Ordering::Relaxed)),
    );
    Ok(())
}

fn session_with_logging(
    connector: Box<dyn listen_core::ChannelConnector>,
    engine: Box<dyn PlaybackStrategy>,
) -> LiveSession {
    let mut session = LiveSession::new(connector, engine);
    session.on_state_change(|snap| match &snap.last_error {
        Some(reason) => tracing::info!(
            state = %snap.state,
            listeners = snap.listener_count,
            reason = %reason,
            "session update"
        ),
        None => tracing::info!(
            state = %snap.state,
            listeners = snap.listener_count,
            "session update"
        ),
    });
    session
}

fn open_device_output(settings: &Settings) -> Result<(Box<dyn PlaybackStrategy>, DeviceOutput)> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, settings.device.as_deref())?;
    let supported = device::pick_output_config(&device, settings.rate)?;
    let mut stream_config: cpal::StreamConfig = supported.clone().into();
    if let Some(buf) = device::pick_buffer_size(&supported) {
        stream_config.buffer_size = buf;
    }
    tracing::info!(device = %device.description()?, "output device");
    tracing::info!(
        source_rate_hz = settings.rate,
        output_rate_hz = stream_config.sample_rate,
        buffer_size = ?stream_config.buffer_size,
        "device output config"
    );

    // The queue carries samples in the device layout; the sink remaps each
    // scheduled buffer on the way in.
    let device_channels = stream_config.channels as usize;
    let queue = Arc::new(SampleQueue::new(
        device_channels,
        calc_max_buffered_samples(
            stream_config.sample_rate,
            device_channels,
            settings.buffer_seconds,
        ),
    ));

    let played_frames = Arc::new(AtomicU64::new(0));
    let underrun_frames = Arc::new(AtomicU64::new(0));
    let underrun_events = Arc::new(AtomicU64::new(0));
    let stream = build_output_stream(
        &device,
        &stream_config,
        supported.sample_format(),
        &queue,
        PlaybackConfig {
            refill_max_frames: settings.refill_max_frames,
            paused: None,
            played_frames: Some(played_frames.clone()),
            underrun_frames: Some(underrun_frames),
            underrun_events: Some(underrun_events.clone()),
        },
    )?;
    stream.play().context("start output stream")?;

    let sink = CpalSink::new(queue.clone(), stream_config.sample_rate);
    let engine = DecodeSchedule::new(
        sink,
        PcmSpec {
            sample_rate: settings.rate,
            channels: settings.channels,
        },
        settings.max_pending,
    );

    Ok((
        Box::new(engine),
        DeviceOutput {
            queue,
            _stream: stream,
            played_frames,
            underrun_events,
        },
    ))
}

/// Feed transcript lines to the session. Returns `true` if interrupted.
fn run_transcript(
    session: &mut LiveSession,
    reader: Box<dyn BufRead>,
    settings: &Settings,
    fast: bool,
    shutdown_rx: &Receiver<()>,
) -> Result<bool> {
    let mut line_no = 0usize;

    for line in reader.lines() {
        if shutdown_rx.try_recv().is_ok() {
            tracing::info!("interrupted; leaving session");
            session.leave();
            return Ok(true);
        }

        let line = line.context("read transcript line")?;
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = replay::parse_event(&line, line_no)?;
        let pace = if fast {
            None
        } else {
            replay::chunk_duration(&event, settings.rate, settings.channels)
        };

        session.handle_event(event);
        session.on_sink_ready();

        if let Some(d) = pace {
            sleep_or_shutdown(d, shutdown_rx);
        }

        if matches!(
            session.state(),
            SessionState::Ended | SessionState::Errored | SessionState::Disconnected
        ) {
            break;
        }
    }

    Ok(false)
}

/// Sleep in short slices so Ctrl-C stays responsive during paced replay.
fn sleep_or_shutdown(total: Duration, shutdown_rx: &Receiver<()>) {
    let slice = Duration::from_millis(50);
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if shutdown_rx.is_full() {
            return;
        }
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

fn print_summary(session: &LiveSession, frames: u64, rate: u32, underrun_events: Option<u64>) {
    let stats = session.engine_stats();
    println!("state: {}", session.state());
    println!(
        "listeners: {} (peak {})",
        session.listener_count(),
        session.peak_listener_count()
    );
    println!(
        "chunks: {} enqueued, {} submitted, {} dropped (overflow), {} truncated, {} undecodable",
        stats.enqueued,
        stats.submitted,
        stats.dropped_overflow,
        stats.truncated,
        session.decode_errors()
    );
    if rate > 0 {
        println!("audio: {:.1}s", frames as f64 / rate as f64);
    }
    if let Some(events) = underrun_events {
        println!("underruns: {events}");
    }
}
