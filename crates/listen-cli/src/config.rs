//! Configuration loading and parsing.
//!
//! Optional TOML file; command-line flags override whatever it sets.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Listener configuration loaded from TOML. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ListenConfig {
    /// Session id to join.
    pub session_id: Option<String>,
    /// Output device substring match.
    pub device: Option<String>,
    /// Fallback sample rate for chunks without metadata.
    pub sample_rate: Option<u32>,
    /// Fallback channel count for chunks without metadata.
    pub channels: Option<u16>,
    /// Playback queue target in seconds.
    pub buffer_seconds: Option<f32>,
    /// Max chunks held while the sink is busy.
    pub max_pending: Option<usize>,
}

impl ListenConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ListenConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let cfg: ListenConfig = toml::from_str(
            r#"
            session_id = "abc123"
            sample_rate = 44100
            "#,
        )
        .unwrap();
        assert_eq!(cfg.session_id.as_deref(), Some("abc123"));
        assert_eq!(cfg.sample_rate, Some(44_100));
        assert_eq!(cfg.device, None);
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg: ListenConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.max_pending, None);
        assert_eq!(cfg.buffer_seconds, None);
    }
}
