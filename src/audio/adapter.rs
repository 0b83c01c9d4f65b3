use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capture format requested from the adapter
///
/// The assessment backend expects mono 16-bit PCM at 44.1kHz, so this is the
/// default and the only format the controller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono)
    pub channels: u16,
    /// Bits per PCM sample
    pub bits_per_sample: u16,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

/// Outcome of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Platform audio-session flags toggled around a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioMode {
    pub allows_recording: bool,
    pub plays_in_silent_mode: bool,
}

impl AudioMode {
    /// Mode used while a capture is open
    pub fn recording() -> Self {
        Self {
            allows_recording: true,
            plays_in_silent_mode: true,
        }
    }

    /// Mode restored once capture is released
    pub fn playback() -> Self {
        Self {
            allows_recording: false,
            plays_in_silent_mode: false,
        }
    }
}

/// Opaque locator of a finished recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(format!("file://{}", path.as_ref().display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Local filesystem path, if the locator points at one
    pub fn to_path(&self) -> Option<PathBuf> {
        if self.is_empty() {
            return None;
        }

        match self.0.strip_prefix("file://") {
            Some(path) => Some(PathBuf::from(path)),
            None if self.0.contains("://") => None,
            None => Some(PathBuf::from(&self.0)),
        }
    }

    /// File name component, used when uploading the recording
    pub fn file_name(&self) -> Option<String> {
        self.to_path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open capture stream
///
/// Deliberately not `Clone`: whoever holds the handle is the only party allowed
/// to stop the stream.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CaptureHandle(u64);

impl CaptureHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Device status for an open capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureStatus {
    /// Whether the device is still recording
    pub is_active: bool,
    /// Time spent recording so far
    pub elapsed: Duration,
    /// File left behind by a device that stopped on its own
    pub recorded: Option<AudioRef>,
}

/// Audio capture capability consumed by the session controller
///
/// Implementations:
/// - `WavCaptureAdapter`: records an `AudioFeed` into a WAV file
/// - test doubles that script permission/start/stop outcomes
#[async_trait::async_trait]
pub trait CaptureAdapter: Send + Sync {
    /// Ask the platform for microphone access
    async fn request_permission(&self) -> Result<Permission>;

    /// Open a capture stream
    async fn start(&self, config: SampleConfig) -> Result<CaptureHandle>;

    /// Query whether the stream behind `handle` is still recording
    ///
    /// Reporting a stream that stopped on its own also releases it; the handle
    /// is unknown afterwards.
    async fn status(&self, handle: &CaptureHandle) -> Result<CaptureStatus>;

    /// Stop the stream and return the recorded file, if one was produced
    async fn stop(&self, handle: &CaptureHandle) -> Result<Option<AudioRef>>;

    /// Switch platform audio-session flags
    async fn set_audio_mode(&self, mode: AudioMode) -> Result<()>;

    /// Undo the side effects of a recording (audio mode)
    async fn reset(&self) -> Result<()> {
        self.set_audio_mode(AudioMode::playback()).await
    }

    /// Adapter name for logging
    fn name(&self) -> &str;
}
