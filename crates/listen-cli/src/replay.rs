//! Captured-transcript replay.
//!
//! Feeds a session from an NDJSON capture of channel events, one JSON
//! object per line, exactly as they came off the wire. The outbound half is
//! a logging stub; replay has nobody to talk to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use listen_core::{
    ChannelConnector, CommandChannel, PcmBuffer, PcmSink, SinkError, SinkReadiness, TransportError,
};
use listen_events::{ChannelEvent, Command, decode_chunk, pcm_duration_secs};
use tracing::debug;

/// Parse one transcript line into a channel event.
pub fn parse_event(line: &str, line_no: usize) -> Result<ChannelEvent> {
    serde_json::from_str(line).with_context(|| format!("parse event at line {line_no}"))
}

/// Wall-clock duration of an audio chunk, for paced replay.
///
/// Returns `None` for non-audio events and undecodable payloads; the
/// session logs and counts those separately.
pub fn chunk_duration(
    event: &ChannelEvent,
    fallback_rate: u32,
    fallback_channels: u16,
) -> Option<Duration> {
    let ChannelEvent::AudioStream {
        audio_chunk,
        sample_rate,
        channels,
    } = event
    else {
        return None;
    };

    let bytes = decode_chunk(audio_chunk).ok()?;
    let secs = pcm_duration_secs(
        bytes.len() / 2,
        sample_rate.unwrap_or(fallback_rate),
        channels.unwrap_or(fallback_channels),
    );
    Some(Duration::from_secs_f64(secs))
}

/// Connector whose channels log outbound commands instead of sending them.
#[derive(Default)]
pub struct ReplayConnector {
    log: Arc<Mutex<Vec<Command>>>,
}

impl ReplayConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_log(&self) -> Arc<Mutex<Vec<Command>>> {
        self.log.clone()
    }
}

impl ChannelConnector for ReplayConnector {
    fn connect(&mut self) -> Result<Box<dyn CommandChannel>, TransportError> {
        Ok(Box::new(ReplayChannel {
            log: self.log.clone(),
        }))
    }
}

struct ReplayChannel {
    log: Arc<Mutex<Vec<Command>>>,
}

impl CommandChannel for ReplayChannel {
    fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        debug!(?command, "replay command (not sent)");
        if let Ok(mut log) = self.log.lock() {
            log.push(command.clone());
        }
        Ok(())
    }

    fn close(&mut self) {}
}

/// Always-ready sink that discards audio and counts scheduled frames.
/// Backs `--dry-run`.
#[derive(Default)]
pub struct DiscardSink {
    scheduled_frames: Arc<AtomicU64>,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        self.scheduled_frames.clone()
    }
}

impl PcmSink for DiscardSink {
    fn readiness(&self) -> SinkReadiness {
        SinkReadiness::Ready
    }

    fn schedule(&mut self, buffer: PcmBuffer) -> Result<(), SinkError> {
        self.scheduled_frames
            .fetch_add(buffer.frames() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose;
    use listen_core::{DecodeSchedule, LiveSession, PcmSpec, SessionState};

    fn transcript() -> Vec<String> {
        let chunk = general_purpose::STANDARD.encode([0u8, 64, 0, 192]);
        vec![
            r#"{"event":"connect"}"#.to_string(),
            r#"{"event":"joined","currentListeners":3}"#.to_string(),
            format!(r#"{{"event":"audio-stream","audioChunk":"{chunk}","sampleRate":44100}}"#),
            format!(r#"{{"event":"audio-stream","audioChunk":"{chunk}"}}"#),
            r#"{"event":"listener-update","currentListeners":7,"peakListeners":9}"#.to_string(),
            r#"{"event":"ended"}"#.to_string(),
        ]
    }

    #[test]
    fn replays_a_full_capture_to_ended() {
        let connector = ReplayConnector::new();
        let commands = connector.command_log();
        let sink = DiscardSink::new();
        let frames = sink.frame_counter();

        let mut session = LiveSession::new(
            Box::new(connector),
            Box::new(DecodeSchedule::new(sink, PcmSpec::default(), 256)),
        );
        session.join("abc123").unwrap();

        for (i, line) in transcript().iter().enumerate() {
            let event = parse_event(line, i + 1).unwrap();
            session.handle_event(event);
            session.on_sink_ready();
        }

        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.listener_count(), 7);
        assert_eq!(session.peak_listener_count(), 9);
        assert_eq!(session.engine_stats().submitted, 2);
        assert_eq!(frames.load(Ordering::Relaxed), 4);
        assert_eq!(
            *commands.lock().unwrap(),
            vec![Command::Join {
                session_id: "abc123".to_string()
            }]
        );
    }

    #[test]
    fn parse_event_reports_line_number() {
        let err = parse_event("{not json", 17).unwrap_err();
        assert!(format!("{err:#}").contains("line 17"));
    }

    #[test]
    fn chunk_duration_uses_chunk_metadata() {
        let chunk = general_purpose::STANDARD.encode(vec![0u8; 88_200]);
        let event = ChannelEvent::AudioStream {
            audio_chunk: chunk,
            sample_rate: Some(44_100),
            channels: Some(1),
        };
        let d = chunk_duration(&event, 48_000, 2).unwrap();
        assert!((d.as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn chunk_duration_is_none_for_other_events() {
        assert!(chunk_duration(&ChannelEvent::Ended, 48_000, 1).is_none());
    }
}
