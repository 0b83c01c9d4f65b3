use thiserror::Error;

use super::state::FailureReason;

/// Errors surfaced by the session controller
///
/// Capture-level errors end the session in `Failed`; the controller never
/// retries them itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session duration must be at least one second")]
    InvalidDuration,

    #[error("a session is already {0}")]
    Busy(&'static str),

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("failed to start audio capture: {0}")]
    CaptureStartFailure(String),

    #[error("failed to stop audio capture: {0}")]
    CaptureStopFailure(String),

    #[error("recording finished but no audio file was produced")]
    NoFileProduced,

    #[error("session was cancelled")]
    Cancelled,

    #[error("no recording in progress")]
    NoOp,
}

impl SessionError {
    /// Terminal reason recorded in `SessionState::Failed`, if this error ends a session
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::PermissionDenied => Some(FailureReason::PermissionDenied),
            Self::CaptureStartFailure(_) => Some(FailureReason::CaptureStartFailure),
            Self::CaptureStopFailure(_) => Some(FailureReason::CaptureStopFailure),
            Self::NoFileProduced => Some(FailureReason::NoFileProduced),
            _ => None,
        }
    }

    /// The session is over and the caller decides whether to start another
    pub fn is_fatal(&self) -> bool {
        self.failure_reason().is_some()
    }

    /// Starting a fresh session may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CaptureStartFailure(_) | Self::CaptureStopFailure(_) | Self::NoFileProduced
        )
    }
}
