//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL. A live stream has a fixed source rate and no
//! resampler, so config selection is a straight distance ranking against
//! that rate rather than a general-purpose negotiation.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle`
/// (case-insensitive), or the host default when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let Some(needle) = needle else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default output device"));
    };

    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("Empty device match string"));
    }

    host.output_devices()
        .context("No output devices")?
        .find(|d| {
            d.description()
                .map(|desc| desc.name().to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("No output device matched: {needle}"))
}

/// Choose the output config closest to the source rate.
///
/// Exact match first, then the nearest rate at or below the source, then
/// the nearest above it. `f32` output breaks ties.
pub fn pick_output_config(
    device: &cpal::Device,
    source_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    device
        .supported_output_configs()?
        .map(|range| {
            let rate = clamp_rate(range.min_sample_rate(), range.max_sample_rate(), source_rate);
            let key = rate_preference(rate, source_rate, range.sample_format());
            (key, range.with_sample_rate(rate))
        })
        .min_by_key(|(key, _)| *key)
        .map(|(_, cfg)| cfg)
        .ok_or_else(|| anyhow!("No supported output configs"))
}

/// Cap the stream buffer at 16k frames when the device advertises a range;
/// `None` keeps the device default.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    const CAP_FRAMES: u32 = 16_384;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(CAP_FRAMES.clamp(*min, *max)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

fn clamp_rate(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max)
}

/// Sort key for config candidates: rates above the source lose to rates at
/// or below it, then distance to the source, then sample format (f32 first).
fn rate_preference(rate: u32, source_rate: u32, format: cpal::SampleFormat) -> (bool, u32, u8) {
    let format_penalty = match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    };
    (rate > source_rate, rate.abs_diff(source_rate), format_penalty)
}

/// Print available output devices to stdout (`--list-devices` UX).
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_passes_in_range_targets() {
        assert_eq!(clamp_rate(44_100, 96_000, 48_000), 48_000);
    }

    #[test]
    fn clamp_rate_pins_to_range_edges() {
        assert_eq!(clamp_rate(44_100, 96_000, 22_050), 44_100);
        assert_eq!(clamp_rate(44_100, 96_000, 192_000), 96_000);
    }

    #[test]
    fn exact_rate_outranks_everything() {
        let exact = rate_preference(48_000, 48_000, cpal::SampleFormat::I16);
        let below = rate_preference(44_100, 48_000, cpal::SampleFormat::F32);
        let above = rate_preference(96_000, 48_000, cpal::SampleFormat::F32);
        assert!(exact < below);
        assert!(exact < above);
    }

    #[test]
    fn rate_below_source_outranks_rate_above() {
        let below = rate_preference(32_000, 48_000, cpal::SampleFormat::I16);
        let above = rate_preference(50_000, 48_000, cpal::SampleFormat::F32);
        assert!(below < above);
    }

    #[test]
    fn nearer_rate_wins_among_rates_below() {
        let near = rate_preference(44_100, 48_000, cpal::SampleFormat::I16);
        let far = rate_preference(32_000, 48_000, cpal::SampleFormat::F32);
        assert!(near < far);
    }

    #[test]
    fn f32_breaks_rate_ties() {
        let float = rate_preference(48_000, 48_000, cpal::SampleFormat::F32);
        let int = rate_preference(48_000, 48_000, cpal::SampleFormat::I16);
        assert!(float < int);
    }
}
