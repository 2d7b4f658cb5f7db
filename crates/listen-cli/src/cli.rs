use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "listen", version)]
pub struct Args {
    /// Captured event transcript (NDJSON), or `-` for stdin
    pub capture: Option<PathBuf>,

    /// Session id to join [default: local]
    #[arg(long)]
    pub session_id: Option<String>,

    /// Optional TOML config file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Run the session without an audio device, printing a summary at the end
    #[arg(long)]
    pub dry_run: bool,

    /// Replay as fast as possible instead of pacing by chunk duration
    #[arg(long)]
    pub fast: bool,

    /// Fallback sample rate for chunks without metadata [default: 48000]
    #[arg(long)]
    pub rate: Option<u32>,

    /// Fallback channel count for chunks without metadata [default: 1]
    #[arg(long)]
    pub channels: Option<u16>,

    /// Playback queue target in seconds [default: 2.0]
    #[arg(long)]
    pub buffer_seconds: Option<f32>,

    /// Playback callback refill cap (frames). Larger reduces lock churn but can add latency.
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,

    /// Max chunks held while the sink is busy [default: 256]
    #[arg(long)]
    pub max_pending: Option<usize>,
}
