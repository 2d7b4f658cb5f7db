//! Core live-listening session logic: state machine, playback engine, and
//! the sink/transport seams the hosting environment implements.

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod session;
pub mod sink;

pub use coordinator::{NowPlaying, PlayerId};
pub use engine::{
    Chunk, DecodeSchedule, EngineConfig, EngineStats, EnqueueOutcome, PcmSpec, PlaybackStrategy,
    StreamingAppend,
};
pub use error::{ChunkDecodeError, SessionError, SinkError, TransportError};
pub use session::{ChannelConnector, CommandChannel, LiveSession, SessionSnapshot, SessionState};
pub use sink::{ByteSink, PcmBuffer, PcmSink, SinkReadiness};
