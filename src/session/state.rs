use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SessionError;
use crate::audio::AudioRef;

/// Why a session ended without a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PermissionDenied,
    CaptureStartFailure,
    CaptureStopFailure,
    NoFileProduced,
}

/// What triggered a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    UserRequested,
    TimerExpired,
}

/// Lifecycle of a capture session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Acquiring,
    Active,
    Stopping,
    Completed(AudioRef),
    Failed(FailureReason),
    Terminated,
}

impl SessionState {
    /// Stable label for logs and API payloads
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Terminated => "terminated",
        }
    }

    /// A session is running (or being torn down) in this state
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Active | Self::Stopping)
    }

    /// The session has ended, one way or another
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Terminated)
    }
}

/// Notification emitted on every transition and every tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUpdate {
    pub session_id: Option<Uuid>,
    #[serde(flatten)]
    pub state: SessionState,
    pub duration_seconds: u32,
    pub remaining_seconds: u32,
    pub elapsed_ms: Option<u64>,
}

impl SessionUpdate {
    /// Share of the countdown already consumed, 0-100
    pub fn progress_percent(&self) -> u8 {
        if self.duration_seconds == 0 {
            return 0;
        }
        let used = self.duration_seconds.saturating_sub(self.remaining_seconds) as u64;
        (used * 100 / self.duration_seconds as u64).min(100) as u8
    }
}

/// Result of a single timer tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown continues with this many seconds left
    Progress(u32),
    /// Countdown hit zero and the session was stopped
    Expired(Result<AudioRef, SessionError>),
    /// No active countdown; the tick was dropped
    Ignored,
}

impl TickOutcome {
    pub fn keeps_ticking(&self) -> bool {
        matches!(self, Self::Progress(_))
    }
}
