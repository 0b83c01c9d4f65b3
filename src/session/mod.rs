//! Recording session management
//!
//! This module provides the `RecordingSessionController` that manages:
//! - Microphone permission and capture acquisition
//! - The one-second countdown (`SessionTimer`)
//! - Stop arbitration between the timer and the user
//! - Exactly-once release of the capture device on every exit path

mod config;
mod controller;
mod error;
mod state;
mod timer;

pub use config::SessionSettings;
pub use controller::RecordingSessionController;
pub use error::SessionError;
pub use state::{FailureReason, SessionState, SessionUpdate, StopReason, TickOutcome};
pub use timer::{SessionTimer, TimerControl};
