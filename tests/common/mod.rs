// Test doubles shared by the integration tests

#![allow(dead_code)]

use anyhow::Result;
use fluency_recorder::audio::{
    AudioMode, AudioRef, CaptureAdapter, CaptureHandle, CaptureStatus, Permission, SampleConfig,
};
use fluency_recorder::session::{RecordingSessionController, SessionSettings};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capture adapter whose behaviour is fixed up front and whose calls are counted
pub struct ScriptedCapture {
    permission: Permission,
    fail_start: bool,
    fail_stop: bool,
    produce_file: bool,
    permission_delay: Option<Duration>,
    start_delay: Option<Duration>,
    stop_delay: Option<Duration>,
    self_stopped: AtomicBool,

    next_id: AtomicU64,
    open_handles: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    modes: Mutex<Vec<AudioMode>>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self {
            permission: Permission::Granted,
            fail_start: false,
            fail_stop: false,
            produce_file: true,
            permission_delay: None,
            start_delay: None,
            stop_delay: None,
            self_stopped: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            open_handles: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            permission: Permission::Denied,
            ..Self::new()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// Every `stop()` errors; the device is still released
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::new()
        }
    }

    pub fn without_file() -> Self {
        Self {
            produce_file: false,
            ..Self::new()
        }
    }

    pub fn with_stop_delay(delay: Duration) -> Self {
        Self {
            stop_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn with_permission_delay(delay: Duration) -> Self {
        Self {
            permission_delay: Some(delay),
            ..Self::new()
        }
    }

    /// The handle only exists once the delay has passed
    pub fn with_start_delay(delay: Duration) -> Self {
        Self {
            start_delay: Some(delay),
            ..Self::new()
        }
    }

    /// Make the device report that it stopped on its own
    pub fn stop_by_itself(&self) {
        self.self_stopped.store(true, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    /// Captures started and not yet stopped
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn last_mode(&self) -> Option<AudioMode> {
        self.modes.lock().unwrap().last().copied()
    }

    fn recording(id: u64) -> AudioRef {
        AudioRef::new(format!("file:///tmp/scripted-{:03}.wav", id))
    }
}

#[async_trait::async_trait]
impl CaptureAdapter for ScriptedCapture {
    async fn request_permission(&self) -> Result<Permission> {
        if let Some(delay) = self.permission_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.permission)
    }

    async fn start(&self, _config: SampleConfig) -> Result<CaptureHandle> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            anyhow::bail!("input device busy");
        }
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }

        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn status(&self, handle: &CaptureHandle) -> Result<CaptureStatus> {
        let stopped = self.self_stopped.load(Ordering::SeqCst);
        Ok(CaptureStatus {
            is_active: !stopped,
            elapsed: Duration::from_secs(1),
            recorded: (stopped && self.produce_file).then(|| Self::recording(handle.id())),
        })
    }

    async fn stop(&self, handle: &CaptureHandle) -> Result<Option<AudioRef>> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stop_delay {
            tokio::time::sleep(delay).await;
        }

        self.open_handles.fetch_sub(1, Ordering::SeqCst);
        if self.fail_stop {
            anyhow::bail!("device did not acknowledge stop");
        }
        Ok(self.produce_file.then(|| Self::recording(handle.id())))
    }

    async fn set_audio_mode(&self, mode: AudioMode) -> Result<()> {
        self.modes.lock().unwrap().push(mode);
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        self.set_audio_mode(AudioMode::playback()).await
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Controller over `capture` ticking once per second
pub fn controller(capture: &Arc<ScriptedCapture>) -> RecordingSessionController {
    RecordingSessionController::new(capture.clone(), SessionSettings::default())
}

/// Controller whose timer never fires within a test, for driving `tick()` by hand
pub fn manual_controller(capture: &Arc<ScriptedCapture>) -> RecordingSessionController {
    let settings = SessionSettings {
        tick_period: Duration::from_secs(24 * 3600),
        ..SessionSettings::default()
    };
    RecordingSessionController::new(capture.clone(), settings)
}
