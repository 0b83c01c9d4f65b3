use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::adapter::SampleConfig;
use super::file::AudioFile;

/// Shortest frame a feed will produce; `tokio::time::interval` rejects zero
const MIN_FRAME_DURATION: Duration = Duration::from_millis(1);

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of the frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = (self.samples.len() / self.channels as usize) as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Source of audio frames for a capture
///
/// Opening a feed spawns the producer; the feed ends when its sender is dropped,
/// which the capture adapter treats as the device stopping on its own.
pub trait AudioFeed: Send + Sync {
    /// Start producing frames in the requested format
    fn open(&self, config: SampleConfig) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Feed name for logging
    fn name(&self) -> &str;
}

/// Endless (or bounded) silence, paced in real time
#[derive(Debug, Clone)]
pub struct SilenceFeed {
    /// Length of each frame
    pub frame_duration: Duration,
    /// Stop producing after this much audio; `None` runs until the capture stops
    pub limit: Option<Duration>,
}

impl Default for SilenceFeed {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_millis(100),
            limit: None,
        }
    }
}

impl AudioFeed for SilenceFeed {
    fn open(&self, config: SampleConfig) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(64);
        let frame_duration = self.frame_duration.max(MIN_FRAME_DURATION);
        let limit = self.limit;

        let frame_ms = frame_duration.as_millis() as u64;
        let samples_per_frame =
            (config.sample_rate as u64 * frame_ms / 1000) as usize * config.channels as usize;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_duration);
            let mut timestamp_ms = 0u64;

            loop {
                interval.tick().await;

                if let Some(limit) = limit {
                    if timestamp_ms >= limit.as_millis() as u64 {
                        debug!("Silence feed reached its limit");
                        break;
                    }
                }

                let frame = AudioFrame {
                    samples: vec![0i16; samples_per_frame],
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                    timestamp_ms,
                };

                if tx.send(frame).await.is_err() {
                    break; // capture closed
                }
                timestamp_ms += frame_ms;
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "silence"
    }
}

/// Replays a WAV file as if it were being spoken into the microphone
#[derive(Debug, Clone)]
pub struct FileFeed {
    pub path: PathBuf,
    /// Length of each frame
    pub frame_duration: Duration,
    /// Sleep for each frame's duration before sending the next one
    pub realtime: bool,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_duration: Duration::from_millis(100),
            realtime: true,
        }
    }
}

impl AudioFeed for FileFeed {
    fn open(&self, config: SampleConfig) -> Result<mpsc::Receiver<AudioFrame>> {
        let audio = AudioFile::open(&self.path)?;
        if !can_remix(audio.channels, config.channels) {
            anyhow::bail!(
                "Cannot convert {}-channel audio in {} to {} channels",
                audio.channels,
                audio.path,
                config.channels
            );
        }

        let frame_duration = self.frame_duration.max(MIN_FRAME_DURATION);
        let frames = audio.frames(&config, frame_duration.as_millis() as u64);

        info!(
            "Replaying {} as {} frames ({}Hz, {} channels)",
            audio.path,
            frames.len(),
            config.sample_rate,
            config.channels
        );

        let (tx, rx) = mpsc::channel(64);
        let realtime = self.realtime;

        tokio::spawn(async move {
            for frame in frames {
                if realtime {
                    tokio::time::sleep(frame_duration).await;
                }
                if tx.send(frame).await.is_err() {
                    return; // capture closed
                }
            }
            debug!("File feed exhausted");
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Whether `conform_frame` can convert `from` channels to `to`
///
/// Anything folds down to mono and mono spreads to any layout; other
/// multichannel conversions have no obvious mapping.
pub fn can_remix(from: u16, to: u16) -> bool {
    from == to || (from > 0 && to == 1) || (from == 1 && to > 0)
}

/// Convert a frame to the capture format: remix first, then resample
///
/// Layouts `can_remix` rejects are passed through unchanged.
pub fn conform_frame(frame: AudioFrame, config: &SampleConfig) -> AudioFrame {
    let mut processed = frame;

    if processed.channels != config.channels {
        processed = remix(processed, config.channels);
    }

    if processed.sample_rate != config.sample_rate {
        processed = resample_nearest(processed, config.sample_rate);
    }

    processed
}

/// Nearest-neighbour resampling, any ratio
fn resample_nearest(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || frame.sample_rate == 0 || target_rate == 0 {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;
    let frames_in = (frame.samples.len() / channels) as u64;
    let frames_out = frames_in * target_rate as u64 / frame.sample_rate as u64;

    let mut samples = Vec::with_capacity(frames_out as usize * channels);
    for i in 0..frames_out {
        let src = (i * frame.sample_rate as u64 / target_rate as u64).min(frames_in - 1) as usize;
        samples.extend_from_slice(&frame.samples[src * channels..(src + 1) * channels]);
    }

    AudioFrame {
        samples,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

fn remix(frame: AudioFrame, channels: u16) -> AudioFrame {
    match (frame.channels, channels) {
        (2, 1) => stereo_to_mono(frame),
        (from, 1) if from > 2 => average_to_mono(frame),
        (1, to) if to > 1 => spread_mono(frame, to),
        _ => frame,
    }
}

/// Average every channel into one
fn average_to_mono(frame: AudioFrame) -> AudioFrame {
    let channels = frame.channels as usize;
    let samples = frame
        .samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Copy a mono signal into every output channel
fn spread_mono(frame: AudioFrame, channels: u16) -> AudioFrame {
    let samples = frame
        .samples
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(channels as usize))
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate,
        channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by summing channels
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {

    let mut mono_samples = Vec::with_capacity(frame.samples.len() / 2);

    // Sum left and right channels (no division to preserve volume)
    for chunk in frame.samples.chunks_exact(2) {
        let sum = chunk[0] as i32 + chunk[1] as i32;
        mono_samples.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate,
            channels,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_stereo_to_mono_sums_and_clamps() {
        let mono = stereo_to_mono(frame(vec![100, 200, i16::MAX, 10], 16000, 2));
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![300, i16::MAX]);
    }

    #[test]
    fn test_surround_averages_to_mono() {
        let mono = remix(frame(vec![600, 0, 0, 0, 0, 0, -60, -60, -60, -60, -60, -60], 16000, 6), 1);
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![100, -60]);
    }

    #[test]
    fn test_mono_spreads_to_stereo() {
        let config = SampleConfig {
            channels: 2,
            ..SampleConfig::default()
        };
        let out = conform_frame(frame(vec![7, -7], 44100, 1), &config);
        assert_eq!(out.channels, 2);
        assert_eq!(out.samples, vec![7, 7, -7, -7]);
    }

    #[test]
    fn test_unmappable_layouts() {
        assert!(can_remix(6, 1));
        assert!(can_remix(1, 2));
        assert!(can_remix(2, 2));
        assert!(!can_remix(3, 2));
        assert!(!can_remix(2, 6));
        assert!(!can_remix(0, 1));
    }

    #[tokio::test]
    async fn test_zero_frame_duration_still_produces_audio() -> Result<()> {
        let feed = SilenceFeed {
            frame_duration: Duration::ZERO,
            limit: Some(Duration::from_millis(5)),
        };

        let mut rx = feed.open(SampleConfig::default())?;
        let frame = rx.recv().await.expect("first frame");
        assert!(!frame.samples.is_empty());
        assert_eq!(frame.samples.len(), 44);

        Ok(())
    }

    #[test]
    fn test_resample_up_and_down() {
        let up = resample_nearest(frame(vec![1, 2, 3, 4], 16000, 1), 32000);
        assert_eq!(up.samples, vec![1, 1, 2, 2, 3, 3, 4, 4]);

        let down = resample_nearest(frame(vec![1, 2, 3, 4, 5, 6], 48000, 1), 16000);
        assert_eq!(down.samples, vec![1, 4]);
    }

    #[test]
    fn test_conform_frame_targets_capture_format() {
        let config = SampleConfig::default();
        let out = conform_frame(frame(vec![0i16; 3200], 16000, 2), &config);

        assert_eq!(out.channels, 1);
        assert_eq!(out.sample_rate, 44100);
        assert_eq!(out.samples.len(), 4410);
        assert_eq!(out.duration_ms(), 100);
    }
}
