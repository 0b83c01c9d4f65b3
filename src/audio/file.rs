use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use tracing::info;

use super::adapter::SampleConfig;
use super::feed::{conform_frame, AudioFrame};

/// A WAV recording loaded into memory
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format in {}: expected 16-bit PCM, got {}-bit {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the recording into fixed-length frames in the capture format
    pub fn frames(&self, config: &SampleConfig, frame_ms: u64) -> Vec<AudioFrame> {
        let whole = conform_frame(
            AudioFrame {
                samples: self.samples.clone(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: 0,
            },
            config,
        );

        let samples_per_frame = ((whole.sample_rate as u64 * frame_ms / 1000) as usize
            * whole.channels as usize)
            .max(whole.channels.max(1) as usize);

        whole
            .samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: whole.sample_rate,
                channels: whole.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}
