//! Audio chunk payload decoding.
//!
//! Chunks arrive base64-encoded inside `audio-stream` events. Decoding is
//! strict: malformed base64 is an error the caller drops per-chunk. PCM
//! conversion is lenient: an odd trailing byte is truncated, never an error.

use base64::Engine as _;
use base64::engine::general_purpose;
use thiserror::Error;

/// A chunk payload that failed to decode. The enclosing session drops the
/// chunk and keeps running.
#[derive(Debug, Error)]
#[error("invalid base64 audio chunk: {0}")]
pub struct ChunkDecodeError(#[from] base64::DecodeError);

/// Decode one base64 chunk payload into raw bytes.
pub fn decode_chunk(payload: &str) -> Result<Vec<u8>, ChunkDecodeError> {
    Ok(general_purpose::STANDARD.decode(payload)?)
}

/// Convert raw 16-bit little-endian PCM into normalized `f32` samples.
///
/// Returns the samples and whether a trailing odd byte was truncated.
/// Samples are scaled from `[-32768, 32767]` into `[-1.0, 1.0]`.
pub fn pcm16le_to_f32(bytes: &[u8]) -> (Vec<f32>, bool) {
    let truncated = bytes.len() % 2 != 0;
    let even = &bytes[..bytes.len() - (bytes.len() % 2)];

    let samples = even
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    (samples, truncated)
}

/// Playback duration of an interleaved PCM buffer, in seconds.
///
/// Returns `0.0` when `sample_rate` or `channels` is zero.
pub fn pcm_duration_secs(sample_count: usize, sample_rate: u32, channels: u16) -> f64 {
    if sample_rate == 0 || channels == 0 {
        return 0.0;
    }
    let frames = sample_count / channels as usize;
    frames as f64 / sample_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_chunk_roundtrip() {
        let bytes = vec![0u8, 1, 2, 3, 254, 255];
        let encoded = general_purpose::STANDARD.encode(&bytes);
        assert_eq!(decode_chunk(&encoded).unwrap(), bytes);
    }

    #[test]
    fn decode_chunk_rejects_malformed_base64() {
        assert!(decode_chunk("not!!base64??").is_err());
    }

    #[test]
    fn pcm_conversion_normalizes_full_scale() {
        // i16::MIN, 0, i16::MAX as little-endian pairs.
        let bytes = [0x00, 0x80, 0x00, 0x00, 0xFF, 0x7F];
        let (samples, truncated) = pcm16le_to_f32(&bytes);
        assert!(!truncated);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], -1.0);
        assert_eq!(samples[1], 0.0);
        assert!((samples[2] - (32767.0 / 32768.0)).abs() < 1e-6);
    }

    #[test]
    fn pcm_conversion_truncates_odd_trailing_byte() {
        let bytes = [0x00, 0x00, 0x01, 0x00, 0xAB];
        let (samples, truncated) = pcm16le_to_f32(&bytes);
        assert!(truncated);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn pcm_conversion_handles_empty_input() {
        let (samples, truncated) = pcm16le_to_f32(&[]);
        assert!(samples.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn duration_counts_frames_not_samples() {
        // 48000 samples at 48kHz stereo = half a second.
        assert_eq!(pcm_duration_secs(48_000, 48_000, 2), 0.5);
        assert_eq!(pcm_duration_secs(48_000, 48_000, 1), 1.0);
        assert_eq!(pcm_duration_secs(48_000, 0, 2), 0.0);
    }
}
