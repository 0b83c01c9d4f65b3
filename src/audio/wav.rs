use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::adapter::{
    AudioMode, AudioRef, CaptureAdapter, CaptureHandle, CaptureStatus, Permission, SampleConfig,
};
use super::feed::{AudioFeed, AudioFrame};

/// Capture adapter that records an `AudioFeed` into a WAV file per capture
pub struct WavCaptureAdapter {
    feed: Arc<dyn AudioFeed>,
    output_dir: PathBuf,
    file_prefix: String,
    next_id: AtomicU64,
    captures: Mutex<HashMap<u64, ActiveCapture>>,
    audio_mode: Mutex<AudioMode>,
}

struct ActiveCapture {
    started_at: Instant,
    stopped_after: Option<std::time::Duration>,
    finished: Arc<AtomicBool>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<WavSummary>>>,
    outcome: Option<Option<AudioRef>>,
}

impl WavCaptureAdapter {
    pub fn new(feed: Arc<dyn AudioFeed>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            feed,
            output_dir: output_dir.into(),
            file_prefix: "fluency".to_string(),
            next_id: AtomicU64::new(1),
            captures: Mutex::new(HashMap::new()),
            audio_mode: Mutex::new(AudioMode::playback()),
        }
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Current audio-session flags
    pub async fn audio_mode(&self) -> AudioMode {
        *self.audio_mode.lock().await
    }

    /// Wait for the recording task and cache what it produced
    async fn finish(capture: &mut ActiveCapture) -> Result<Option<AudioRef>> {
        if let Some(outcome) = &capture.outcome {
            return Ok(outcome.clone());
        }

        if let Some(stop_tx) = capture.stop_tx.take() {
            // Err means the task already ended on its own
            let _ = stop_tx.send(());
        }

        let summary = match capture.task.take() {
            Some(task) => task.await.context("Capture task panicked")??,
            None => anyhow::bail!("Capture task already consumed"),
        };

        capture.stopped_after = Some(capture.started_at.elapsed());

        let outcome = if summary.sample_count == 0 {
            warn!("Capture produced no samples, discarding {:?}", summary.path);
            if let Err(e) = fs::remove_file(&summary.path) {
                warn!("Failed to remove empty recording: {}", e);
            }
            None
        } else {
            info!(
                "Recording saved: {:?} ({} samples, {:.1}s)",
                summary.path,
                summary.sample_count,
                summary.duration_secs()
            );
            Some(AudioRef::from_path(&summary.path))
        };

        capture.outcome = Some(outcome.clone());
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl CaptureAdapter for WavCaptureAdapter {
    async fn request_permission(&self) -> Result<Permission> {
        match fs::create_dir_all(&self.output_dir) {
            Ok(()) => Ok(Permission::Granted),
            Err(e) => {
                warn!(
                    "Recording directory {:?} is not writable: {}",
                    self.output_dir, e
                );
                Ok(Permission::Denied)
            }
        }
    }

    async fn start(&self, config: SampleConfig) -> Result<CaptureHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let path = self.output_dir.join(format!(
            "{}-{}-{:03}.wav",
            self.file_prefix,
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            id
        ));

        // Feed first, so a rejected source leaves no file behind
        let frames = self
            .feed
            .open(config)
            .with_context(|| format!("Failed to open {} feed", self.feed.name()))?;
        let writer = RecordingWriter::create(path, config)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let task_finished = Arc::clone(&finished);

        let task = tokio::spawn(async move {
            let result = record(writer, frames, stop_rx).await;
            task_finished.store(true, Ordering::SeqCst);
            result
        });

        info!("Capture {} started from {} feed", id, self.feed.name());

        self.captures.lock().await.insert(
            id,
            ActiveCapture {
                started_at: Instant::now(),
                stopped_after: None,
                finished,
                stop_tx: Some(stop_tx),
                task: Some(task),
                outcome: None,
            },
        );

        Ok(CaptureHandle::new(id))
    }

    async fn status(&self, handle: &CaptureHandle) -> Result<CaptureStatus> {
        let mut captures = self.captures.lock().await;
        let capture = captures
            .get_mut(&handle.id())
            .with_context(|| format!("Unknown capture handle {}", handle.id()))?;

        if !capture.finished.load(Ordering::SeqCst) {
            return Ok(CaptureStatus {
                is_active: true,
                elapsed: capture.started_at.elapsed(),
                recorded: None,
            });
        }

        // Feed ran dry: the device stopped by itself and nobody will call stop()
        let finished = Self::finish(capture).await;
        let elapsed = capture
            .stopped_after
            .unwrap_or_else(|| capture.started_at.elapsed());
        captures.remove(&handle.id());
        debug!("Capture {} stopped on its own, released", handle.id());

        Ok(CaptureStatus {
            is_active: false,
            elapsed,
            recorded: finished?,
        })
    }

    async fn stop(&self, handle: &CaptureHandle) -> Result<Option<AudioRef>> {
        let mut capture = self
            .captures
            .lock()
            .await
            .remove(&handle.id())
            .with_context(|| format!("Unknown capture handle {}", handle.id()))?;

        debug!("Stopping capture {}", handle.id());
        Self::finish(&mut capture).await
    }

    async fn set_audio_mode(&self, mode: AudioMode) -> Result<()> {
        debug!("Audio mode: {:?}", mode);
        *self.audio_mode.lock().await = mode;
        Ok(())
    }

    fn name(&self) -> &str {
        "wav"
    }
}

async fn record(
    mut writer: RecordingWriter,
    mut frames: mpsc::Receiver<AudioFrame>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<WavSummary> {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            frame = frames.recv() => match frame {
                Some(frame) => writer.write_frame(&frame)?,
                None => {
                    debug!("Audio feed closed");
                    break;
                }
            },
        }
    }

    writer.finish()
}

/// What a finished capture left on disk
#[derive(Debug, Clone)]
struct WavSummary {
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    sample_count: usize,
}

impl WavSummary {
    fn duration_secs(&self) -> f64 {
        self.sample_count as f64 / (self.sample_rate as f64 * self.channels.max(1) as f64)
    }
}

/// Writes one capture to disk as a WAV file
struct RecordingWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    summary: WavSummary,
}

impl RecordingWriter {
    fn create(path: PathBuf, config: SampleConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create recording directory")?;
        }

        let spec = hound::WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample: config.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            summary: WavSummary {
                path,
                sample_rate: config.sample_rate,
                channels: config.channels,
                sample_count: 0,
            },
        })
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer.write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.summary.sample_count += frame.samples.len();
        }

        Ok(())
    }

    fn finish(mut self) -> Result<WavSummary> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()
                .context("Failed to finalize WAV file")?;
        }

        Ok(self.summary.clone())
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
