use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionSettings;
use super::error::SessionError;
use super::state::{FailureReason, SessionState, SessionUpdate, StopReason, TickOutcome};
use super::timer::{SessionTimer, TimerControl};
use crate::audio::{AudioMode, AudioRef, CaptureAdapter, CaptureHandle, Permission};

type StopResult = Result<AudioRef, SessionError>;

/// Drives one capture session at a time: acquisition, countdown, stop, cleanup
///
/// The controller is cheap to clone; clones share the same session. Every state
/// change goes through the internal lock, which is never held across an adapter
/// call, so `cancel()` can always get in.
#[derive(Clone)]
pub struct RecordingSessionController {
    shared: Arc<Shared>,
}

struct Shared {
    adapter: Arc<dyn CaptureAdapter>,
    settings: SessionSettings,
    inner: Mutex<Inner>,
    updates: broadcast::Sender<SessionUpdate>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    session: Option<Session>,

    /// A `cancel()` is tearing the session down
    cancelling: bool,

    // Values from the last session, reported after it is dropped
    last_session_id: Option<Uuid>,
    last_duration_seconds: u32,
    last_remaining_seconds: u32,
    last_elapsed_ms: Option<u64>,
}

/// The live session; exists from `begin()` until a terminal state
struct Session {
    id: Uuid,
    duration_seconds: u32,
    remaining_seconds: u32,
    started_at: Option<Instant>,

    /// Present only while Active (and handed to the stop while Stopping)
    capture: Option<CaptureHandle>,

    /// Stop guard: set by the first stop, checked by every later one
    stop_in_flight: bool,
    stop_outcome: Option<watch::Receiver<Option<StopResult>>>,

    timer: Option<SessionTimer>,
}

impl Session {
    fn new(id: Uuid, duration_seconds: u32) -> Self {
        Self {
            id,
            duration_seconds,
            remaining_seconds: duration_seconds,
            started_at: None,
            capture: None,
            stop_in_flight: false,
            stop_outcome: None,
            timer: None,
        }
    }
}

impl Inner {
    fn update(&self) -> SessionUpdate {
        match &self.session {
            Some(session) => SessionUpdate {
                session_id: Some(session.id),
                state: self.state.clone(),
                duration_seconds: session.duration_seconds,
                remaining_seconds: session.remaining_seconds,
                elapsed_ms: session.started_at.map(elapsed_ms),
            },
            None => SessionUpdate {
                session_id: self.last_session_id,
                state: self.state.clone(),
                duration_seconds: self.last_duration_seconds,
                remaining_seconds: self.last_remaining_seconds,
                elapsed_ms: self.last_elapsed_ms,
            },
        }
    }

    /// Live session matching `expected` (any session when `None`)
    fn session_mut(&mut self, expected: Option<Uuid>) -> Option<&mut Session> {
        self.session
            .as_mut()
            .filter(|s| expected.map_or(true, |id| id == s.id))
    }

    fn is_acquiring(&self, session_id: Uuid) -> bool {
        self.state == SessionState::Acquiring
            && !self.cancelling
            && self.session.as_ref().map(|s| s.id) == Some(session_id)
    }
}

enum StopPlan {
    Perform {
        session_id: Uuid,
        capture: Option<CaptureHandle>,
        outcome_tx: watch::Sender<Option<StopResult>>,
        outcome_rx: watch::Receiver<Option<StopResult>>,
    },
    Join(watch::Receiver<Option<StopResult>>),
}

enum CancelPlan {
    Release(Option<CaptureHandle>),
    AwaitStop(watch::Receiver<Option<StopResult>>),
}

impl RecordingSessionController {
    pub fn new(adapter: Arc<dyn CaptureAdapter>, settings: SessionSettings) -> Self {
        let (updates, _) = broadcast::channel(settings.update_buffer.max(1));

        Self {
            shared: Arc::new(Shared {
                adapter,
                settings,
                inner: Mutex::new(Inner::default()),
                updates,
            }),
        }
    }

    /// State-change and progress notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.shared.updates.subscribe()
    }

    pub async fn snapshot(&self) -> SessionUpdate {
        self.shared.inner.lock().await.update()
    }

    pub async fn state(&self) -> SessionState {
        self.shared.inner.lock().await.state.clone()
    }

    /// Start a new session counting down from `duration_seconds`
    pub async fn begin(&self, duration_seconds: u32) -> Result<(), SessionError> {
        if duration_seconds == 0 {
            return Err(SessionError::InvalidDuration);
        }

        let session_id = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state.is_busy() || inner.cancelling {
                return Err(SessionError::Busy(inner.state.label()));
            }

            let id = Uuid::new_v4();
            inner.session = Some(Session::new(id, duration_seconds));
            self.shared.transition(&mut inner, SessionState::Acquiring);
            id
        };

        info!("Beginning session {} ({}s)", session_id, duration_seconds);

        // Acquisition runs detached so a dropped caller cannot strand a handle
        let controller = self.clone();
        let acquire =
            tokio::spawn(async move { controller.acquire(session_id, duration_seconds).await });

        match acquire.await {
            Ok(result) => result,
            Err(e) => {
                error!("Acquisition task for session {} failed: {}", session_id, e);
                Err(SessionError::CaptureStartFailure(e.to_string()))
            }
        }
    }

    async fn acquire(&self, session_id: Uuid, duration_seconds: u32) -> Result<(), SessionError> {
        let adapter = &self.shared.adapter;

        match adapter.request_permission().await {
            Ok(Permission::Granted) => {}
            Ok(Permission::Denied) => {
                warn!("Microphone permission denied for session {}", session_id);
                return self.fail_acquire(session_id, SessionError::PermissionDenied).await;
            }
            Err(e) => {
                error!("Permission request failed: {:#}", e);
                return self.fail_acquire(session_id, SessionError::PermissionDenied).await;
            }
        }

        if !self.shared.inner.lock().await.is_acquiring(session_id) {
            info!("Session {} cancelled while acquiring", session_id);
            return Err(SessionError::Cancelled);
        }

        if let Err(e) = adapter.set_audio_mode(AudioMode::recording()).await {
            error!("Failed to enable recording audio mode: {:#}", e);
            let err = SessionError::CaptureStartFailure(format!("{:#}", e));
            return self.fail_acquire(session_id, err).await;
        }

        let capture = match adapter.start(self.shared.settings.sample_config).await {
            Ok(capture) => capture,
            Err(e) => {
                error!("Failed to start capture on {}: {:#}", adapter.name(), e);
                let err = SessionError::CaptureStartFailure(format!("{:#}", e));
                return self.fail_acquire(session_id, err).await;
            }
        };

        {
            let mut inner = self.shared.inner.lock().await;
            if inner.is_acquiring(session_id) {
                let timer = self.start_timer(session_id);
                if let Some(session) = inner.session.as_mut() {
                    session.capture = Some(capture);
                    session.remaining_seconds = duration_seconds;
                    session.started_at = Some(Instant::now());
                    session.timer = Some(timer);
                }
                self.shared.transition(&mut inner, SessionState::Active);
                info!("Session {} recording", session_id);
                return Ok(());
            }
        }

        // cancel() won the race; the handle we just got is ours to release
        info!("Session {} cancelled during capture start, releasing device", session_id);
        self.release(Some(capture)).await;
        Err(SessionError::Cancelled)
    }

    /// Advance the countdown by one second
    ///
    /// Reaching zero stops the session before returning.
    pub async fn tick(&self) -> TickOutcome {
        self.tick_session(None).await
    }

    /// Stop the active session and return its recording
    ///
    /// Only the first caller touches the device; anyone arriving while that stop
    /// is in flight gets the same outcome, and anyone arriving later gets `NoOp`.
    pub async fn request_stop(&self, reason: StopReason) -> Result<AudioRef, SessionError> {
        self.stop_session(None, reason).await
    }

    /// Abandon whatever is running and release the device
    ///
    /// Never fails; adapter errors are logged. Calls after the first are no-ops.
    pub async fn cancel(&self) {
        let plan = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state == SessionState::Terminated || inner.cancelling {
                debug!("Cancel ignored: session already {}", inner.state.label());
                return;
            }
            inner.cancelling = true;

            match inner.session.as_mut() {
                Some(session) if session.stop_in_flight => match session.stop_outcome.clone() {
                    Some(rx) => CancelPlan::AwaitStop(rx),
                    None => CancelPlan::Release(None),
                },
                Some(session) => {
                    if let Some(timer) = session.timer.take() {
                        timer.cancel();
                    }
                    CancelPlan::Release(session.capture.take())
                }
                None => CancelPlan::Release(None),
            }
        };

        info!("Cancelling session");

        match plan {
            CancelPlan::AwaitStop(mut rx) => {
                // The in-flight stop owns the device; let it finish releasing it
                if rx.wait_for(|outcome| outcome.is_some()).await.is_err() {
                    warn!("In-flight stop was dropped before finishing");
                }
            }
            CancelPlan::Release(capture) => self.release(capture).await,
        }

        let mut inner = self.shared.inner.lock().await;
        inner.cancelling = false;
        self.shared.finalize(&mut inner, SessionState::Terminated);
    }

    fn start_timer(&self, session_id: Uuid) -> SessionTimer {
        let weak = Arc::downgrade(&self.shared);

        SessionTimer::start(self.shared.settings.tick_period, move || {
            let weak = weak.clone();
            async move {
                let Some(shared) = weak.upgrade() else {
                    return TimerControl::Stop;
                };
                let controller = RecordingSessionController { shared };
                if controller.tick_session(Some(session_id)).await.keeps_ticking() {
                    TimerControl::Continue
                } else {
                    TimerControl::Stop
                }
            }
        })
    }

    async fn tick_session(&self, expected: Option<Uuid>) -> TickOutcome {
        let session_id = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != SessionState::Active || inner.cancelling {
                return TickOutcome::Ignored;
            }

            let Some(session) = inner.session_mut(expected) else {
                return TickOutcome::Ignored;
            };
            if session.stop_in_flight {
                return TickOutcome::Ignored;
            }

            session.remaining_seconds = session.remaining_seconds.saturating_sub(1);
            let remaining = session.remaining_seconds;
            let id = session.id;
            self.shared.emit(&inner);

            if remaining > 0 {
                debug!("Session {}: {}s remaining", id, remaining);
                return TickOutcome::Progress(remaining);
            }
            id
        };

        info!("Session {} countdown finished", session_id);
        TickOutcome::Expired(
            self.stop_session(Some(session_id), StopReason::TimerExpired)
                .await,
        )
    }

    async fn stop_session(&self, expected: Option<Uuid>, reason: StopReason) -> StopResult {
        let plan = {
            let mut inner = self.shared.inner.lock().await;
            let state = inner.state.clone();
            let cancelling = inner.cancelling;

            let Some(session) = inner.session_mut(expected) else {
                debug!("Stop ({:?}) ignored: no live session", reason);
                return Err(SessionError::NoOp);
            };

            if session.stop_in_flight {
                match session.stop_outcome.clone() {
                    Some(rx) => StopPlan::Join(rx),
                    None => return Err(SessionError::NoOp),
                }
            } else if state != SessionState::Active || cancelling {
                debug!("Stop ({:?}) ignored in state {}", reason, state.label());
                return Err(SessionError::NoOp);
            } else {
                // Claim the stop guard before anything can suspend
                session.stop_in_flight = true;
                if let Some(timer) = session.timer.take() {
                    timer.cancel();
                }
                let (outcome_tx, outcome_rx) = watch::channel(None);
                session.stop_outcome = Some(outcome_rx.clone());

                let plan = StopPlan::Perform {
                    session_id: session.id,
                    capture: session.capture.take(),
                    outcome_tx,
                    outcome_rx,
                };
                self.shared.transition(&mut inner, SessionState::Stopping);
                plan
            }
        };

        let mut outcome_rx = match plan {
            StopPlan::Join(rx) => {
                debug!("Stop ({:?}) joining the stop already in flight", reason);
                rx
            }
            StopPlan::Perform {
                session_id,
                capture,
                outcome_tx,
                outcome_rx,
            } => {
                info!("Stopping session {} ({:?})", session_id, reason);

                // The guard winner waits like everyone else; the release itself
                // runs detached so it finishes even if this caller goes away
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.perform_stop(session_id, capture, outcome_tx).await;
                });
                outcome_rx
            }
        };

        let result = match outcome_rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone().unwrap_or(Err(SessionError::NoOp)),
            Err(_) => Err(SessionError::Cancelled),
        };
        result
    }

    async fn perform_stop(
        &self,
        session_id: Uuid,
        capture: Option<CaptureHandle>,
        outcome_tx: watch::Sender<Option<StopResult>>,
    ) {
        let outcome = self.stop_capture(capture).await;
        if let Err(e) = self.shared.adapter.reset().await {
            warn!("Failed to reset audio mode: {:#}", e);
        }

        {
            let mut inner = self.shared.inner.lock().await;
            let still_ours = inner.state == SessionState::Stopping
                && inner.session.as_ref().map(|s| s.id) == Some(session_id);
            if still_ours {
                let terminal = match &outcome {
                    Ok(audio) => SessionState::Completed(audio.clone()),
                    Err(e) => SessionState::Failed(
                        e.failure_reason()
                            .unwrap_or(FailureReason::CaptureStopFailure),
                    ),
                };
                self.shared.finalize(&mut inner, terminal);
            }
        }

        match &outcome {
            Ok(audio) => info!("Session {} completed: {}", session_id, audio),
            Err(e) => warn!("Session {} failed to stop cleanly: {}", session_id, e),
        }

        outcome_tx.send_replace(Some(outcome));
    }

    /// Stop the device behind `capture` and collect what it recorded
    async fn stop_capture(&self, capture: Option<CaptureHandle>) -> StopResult {
        let adapter = &self.shared.adapter;
        let Some(capture) = capture else {
            error!("Stopping a session that holds no capture handle");
            return Err(SessionError::NoFileProduced);
        };

        let recorded = match adapter.status(&capture).await {
            Ok(status) if !status.is_active => {
                info!(
                    "Capture already stopped on its own after {:.1}s",
                    status.elapsed.as_secs_f64()
                );
                status.recorded
            }
            Ok(_) => stop_device(adapter.as_ref(), &capture).await?,
            Err(e) => {
                warn!("Capture status unavailable, stopping anyway: {:#}", e);
                stop_device(adapter.as_ref(), &capture).await?
            }
        };

        match recorded {
            Some(audio) if !audio.is_empty() => Ok(audio),
            _ => Err(SessionError::NoFileProduced),
        }
    }

    /// Best-effort teardown for cancel and failed acquisition
    async fn release(&self, capture: Option<CaptureHandle>) {
        let adapter = &self.shared.adapter;

        if let Some(capture) = capture {
            let active = match adapter.status(&capture).await {
                Ok(status) => status.is_active,
                Err(e) => {
                    warn!("Capture status unavailable during cleanup: {:#}", e);
                    true
                }
            };

            if active {
                if let Err(e) = adapter.stop(&capture).await {
                    warn!("Failed to stop capture during cleanup: {:#}", e);
                }
            }
        }

        if let Err(e) = adapter.reset().await {
            warn!("Failed to reset audio mode during cleanup: {:#}", e);
        }
    }

    async fn fail_acquire(&self, session_id: Uuid, err: SessionError) -> Result<(), SessionError> {
        self.release(None).await;

        let mut inner = self.shared.inner.lock().await;
        if !inner.is_acquiring(session_id) {
            return Err(SessionError::Cancelled);
        }

        let reason = err
            .failure_reason()
            .unwrap_or(FailureReason::CaptureStartFailure);
        self.shared.finalize(&mut inner, SessionState::Failed(reason));
        Err(err)
    }
}

impl Shared {
    fn emit(&self, inner: &Inner) {
        // Err only means nobody is subscribed
        let _ = self.updates.send(inner.update());
    }

    fn transition(&self, inner: &mut Inner, state: SessionState) {
        debug!("Session state: {} -> {}", inner.state.label(), state.label());
        inner.state = state;
        self.emit(inner);
    }

    /// Single exit for every terminal transition: drops the live session and
    /// its timer, then records the terminal state
    fn finalize(&self, inner: &mut Inner, terminal: SessionState) {
        if let Some(mut session) = inner.session.take() {
            if let Some(timer) = session.timer.take() {
                timer.cancel();
            }
            if session.capture.is_some() {
                error!("Session {} finalized while still holding a capture", session.id);
            }

            inner.last_session_id = Some(session.id);
            inner.last_duration_seconds = session.duration_seconds;
            inner.last_remaining_seconds = session.remaining_seconds;
            inner.last_elapsed_ms = session.started_at.map(elapsed_ms);
        }

        self.transition(inner, terminal);
    }
}

async fn stop_device(
    adapter: &dyn CaptureAdapter,
    capture: &CaptureHandle,
) -> Result<Option<AudioRef>, SessionError> {
    adapter.stop(capture).await.map_err(|e| {
        error!("Failed to stop capture on {}: {:#}", adapter.name(), e);
        SessionError::CaptureStopFailure(format!("{:#}", e))
    })
}

fn elapsed_ms(started_at: Instant) -> u64 {
    started_at.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}
