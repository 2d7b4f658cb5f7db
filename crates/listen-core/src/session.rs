//! Live listening session controller.
//!
//! One [`LiveSession`] per active listener. The session owns the outbound
//! command channel and the playback engine, consumes inbound channel events,
//! and exposes observable state to the hosting UI.
//!
//! Everything is single-threaded and callback-driven: inbound messages,
//! sink readiness, and user actions all arrive as plain method calls; no
//! call ever blocks.

use listen_events::{ChannelEvent, Command, decode_chunk};
use tracing::{debug, info, warn};

use crate::engine::{Chunk, EngineStats, EnqueueOutcome, PlaybackStrategy};
use crate::error::{SessionError, TransportError};

/// Session lifecycle state.
///
/// `Ended`, `Errored`, and `Disconnected` are terminal: there is no
/// automatic reconnection, the caller must `join` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Buffering,
    Playing,
    Paused,
    Ended,
    Errored,
    Disconnected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Buffering => "buffering",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
            SessionState::Errored => "errored",
            SessionState::Disconnected => "disconnected",
        }
    }

    /// States with a live transport attached.
    fn has_transport(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Connected
                | SessionState::Buffering
                | SessionState::Playing
                | SessionState::Paused
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable snapshot handed to state-change observers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub listener_count: u32,
    pub peak_listener_count: u32,
    /// Reason string for the latest error or non-clean terminal transition.
    pub last_error: Option<String>,
}

/// Outbound half of the realtime channel. The channel implementation (and
/// its event delivery) belongs to the hosting environment.
pub trait CommandChannel {
    fn send(&mut self, command: &Command) -> Result<(), TransportError>;
    fn close(&mut self);
}

/// Opens a fresh command channel per `join`.
pub trait ChannelConnector {
    fn connect(&mut self) -> Result<Box<dyn CommandChannel>, TransportError>;
}

type Observer = Box<dyn FnMut(&SessionSnapshot)>;

pub struct LiveSession {
    session_id: Option<String>,
    state: SessionState,
    listener_count: u32,
    peak_listener_count: u32,
    last_error: Option<String>,
    decode_errors: u64,
    connector: Box<dyn ChannelConnector>,
    channel: Option<Box<dyn CommandChannel>>,
    engine: Box<dyn PlaybackStrategy>,
    observers: Vec<Observer>,
    last_notified: SessionSnapshot,
}

impl LiveSession {
    pub fn new(connector: Box<dyn ChannelConnector>, engine: Box<dyn PlaybackStrategy>) -> Self {
        let initial = SessionSnapshot {
            state: SessionState::Idle,
            listener_count: 0,
            peak_listener_count: 0,
            last_error: None,
        };
        Self {
            session_id: None,
            state: SessionState::Idle,
            listener_count: 0,
            peak_listener_count: 0,
            last_error: None,
            decode_errors: 0,
            connector,
            channel: None,
            engine,
            observers: Vec::new(),
            last_notified: initial,
        }
    }

    /// Start listening to `session_id`.
    ///
    /// An empty id is rejected synchronously and the session stays `Idle`.
    /// Any existing transport is torn down first; connect failures surface
    /// as an `Errored` transition, not as a return value.
    pub fn join(&mut self, session_id: &str) -> Result<(), SessionError> {
        let id = session_id.trim();
        if id.is_empty() {
            return Err(SessionError::Validation(
                "session id must not be empty".to_string(),
            ));
        }

        if self.channel.is_some() {
            self.send_leave_best_effort();
            self.teardown_transport();
        }

        info!(session_id = %id, "joining live session");
        self.session_id = Some(id.to_string());
        self.listener_count = 0;
        self.peak_listener_count = 0;
        self.last_error = None;
        self.state = SessionState::Connecting;
        self.notify();

        match self.connector.connect() {
            Ok(channel) => self.channel = Some(channel),
            Err(e) => self.fail(format!("{e}")),
        }
        Ok(())
    }

    /// Stop listening. Safe from every state, including `Idle`.
    ///
    /// Signals the remote source best-effort, closes the transport, drops
    /// all pending audio, zeroes both listener counts, and returns to
    /// `Idle`.
    pub fn leave(&mut self) {
        if self.channel.is_some() {
            info!(session_id = ?self.session_id, "leaving live session");
        }
        self.send_leave_best_effort();
        self.teardown_transport();
        self.listener_count = 0;
        self.peak_listener_count = 0;
        self.last_error = None;
        self.state = SessionState::Idle;
        self.notify();
    }

    /// Hold playback without dropping buffered audio. Chunks keep queueing.
    pub fn pause(&mut self) {
        if self.state == SessionState::Playing {
            self.engine.set_paused(true);
            self.state = SessionState::Paused;
            self.notify();
        }
    }

    /// Resume a paused session and drain anything queued meanwhile.
    pub fn resume(&mut self) {
        if self.state == SessionState::Paused {
            self.engine.set_paused(false);
            self.state = SessionState::Playing;
            self.notify();
            self.drain();
        }
    }

    /// Register an observer fired synchronously on every snapshot change.
    ///
    /// Each observer fires once per change; no ordering is guaranteed
    /// across observers.
    pub fn on_state_change(&mut self, observer: impl FnMut(&SessionSnapshot) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Feed one inbound channel event. The single entry point for the
    /// transport adapter.
    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connect => self.on_connect(),
            ChannelEvent::Joined { current_listeners } => {
                self.apply_listener_counts(current_listeners, None);
            }
            ChannelEvent::ListenerUpdate {
                current_listeners,
                peak_listeners,
            } => {
                self.apply_listener_counts(current_listeners, peak_listeners);
            }
            ChannelEvent::AudioStream {
                audio_chunk,
                sample_rate,
                channels,
            } => self.on_audio_chunk(&audio_chunk, sample_rate, channels),
            ChannelEvent::Ended => self.on_ended(),
            ChannelEvent::Disconnect => self.on_disconnect(),
        }
    }

    /// The playback sink signalled readiness (source open, update complete,
    /// or a scheduled unit ended).
    pub fn on_sink_ready(&mut self) {
        match self.state {
            SessionState::Connected => {
                self.state = SessionState::Buffering;
                self.notify();
                self.drain();
            }
            SessionState::Buffering | SessionState::Playing => self.drain(),
            // Paused sessions drain on resume; everything else ignores the
            // signal (stale sink callbacks after teardown).
            _ => {}
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn listener_count(&self) -> u32 {
        self.listener_count
    }

    pub fn peak_listener_count(&self) -> u32 {
        self.peak_listener_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Chunks dropped because their payload failed to decode.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    pub fn engine_stats(&self) -> EngineStats {
        self.engine.stats()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            listener_count: self.listener_count,
            peak_listener_count: self.peak_listener_count,
            last_error: self.last_error.clone(),
        }
    }

    fn on_connect(&mut self) {
        if self.state != SessionState::Connecting {
            debug!(state = %self.state, "ignoring connect in current state");
            return;
        }

        self.state = SessionState::Connected;
        self.notify();

        // The join command rides on the freshly opened channel.
        let id = self
            .session_id
            .clone()
            .unwrap_or_default();
        let result = match self.channel.as_mut() {
            Some(channel) => channel.send(&Command::Join { session_id: id }),
            None => Err(TransportError::Send("channel missing".to_string())),
        };
        if let Err(e) = result {
            self.fail(format!("{e}"));
        }
    }

    fn apply_listener_counts(&mut self, current: u32, peak: Option<u32>) {
        if !self.state.has_transport() {
            return;
        }
        self.listener_count = current;
        self.peak_listener_count = self
            .peak_listener_count
            .max(current)
            .max(peak.unwrap_or(0));
        self.notify();
    }

    fn on_audio_chunk(&mut self, payload: &str, sample_rate: Option<u32>, channels: Option<u16>) {
        // Ended/Errored/Disconnected sessions ignore late chunks entirely.
        if !matches!(
            self.state,
            SessionState::Connected
                | SessionState::Buffering
                | SessionState::Playing
                | SessionState::Paused
        ) {
            return;
        }

        let payload = match decode_chunk(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.decode_errors += 1;
                warn!(dropped_total = self.decode_errors, "dropping chunk: {e}");
                self.last_error = Some(format!("audio chunk dropped: {e}"));
                self.notify();
                return;
            }
        };

        let chunk = Chunk {
            payload,
            sample_rate,
            channels,
        };
        match self.engine.enqueue(chunk) {
            // A sink may be ready before its first readiness signal is
            // forwarded; a submit straight from Connected still passes
            // through Buffering so observers see the full sequence.
            Ok(EnqueueOutcome::Submitted)
                if matches!(
                    self.state,
                    SessionState::Connected | SessionState::Buffering
                ) =>
            {
                if self.state == SessionState::Connected {
                    self.state = SessionState::Buffering;
                    self.notify();
                }
                self.state = SessionState::Playing;
                self.notify();
            }
            Ok(_) => {}
            Err(e) => self.fail(format!("{e}")),
        }
    }

    fn on_ended(&mut self) {
        if !self.state.has_transport() {
            return;
        }
        info!(session_id = ?self.session_id, "remote source ended the broadcast");
        self.teardown_transport();
        self.state = SessionState::Ended;
        self.notify();
    }

    fn on_disconnect(&mut self) {
        match self.state {
            // Disconnect before the session was established is a connect
            // failure, not a mid-session drop.
            SessionState::Connecting => {
                self.fail("channel closed before session join completed".to_string());
            }
            SessionState::Connected
            | SessionState::Buffering
            | SessionState::Playing
            | SessionState::Paused => {
                warn!(session_id = ?self.session_id, "realtime channel disconnected");
                self.teardown_transport();
                self.last_error = Some("realtime channel disconnected".to_string());
                self.state = SessionState::Disconnected;
                self.notify();
            }
            _ => {}
        }
    }

    fn drain(&mut self) {
        match self.engine.on_sink_ready() {
            Ok(true) if self.state == SessionState::Buffering => {
                self.state = SessionState::Playing;
                self.notify();
            }
            Ok(_) => {}
            Err(e) => self.fail(format!("{e}")),
        }
    }

    fn fail(&mut self, reason: String) {
        warn!(session_id = ?self.session_id, "session failed: {reason}");
        self.teardown_transport();
        self.last_error = Some(reason);
        self.state = SessionState::Errored;
        self.notify();
    }

    fn send_leave_best_effort(&mut self) {
        if let (Some(id), Some(channel)) = (self.session_id.clone(), self.channel.as_mut()) {
            let _ = channel.send(&Command::Leave { session_id: id });
        }
    }

    fn teardown_transport(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.engine.reset();
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        if snapshot == self.last_notified {
            return;
        }
        self.last_notified = snapshot.clone();

        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer(&snapshot);
        }
        self.observers = observers;
    }
}
