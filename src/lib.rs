pub mod audio;
pub mod config;
pub mod http;
pub mod pipeline;
pub mod session;

pub use audio::{AudioRef, CaptureAdapter, CaptureHandle, WavCaptureAdapter};
pub use config::Config;
pub use http::{create_router, AppState};
pub use pipeline::{AssessmentOutcome, AssessmentPipeline, DegradationPolicy, HttpAssessmentClient};
pub use session::{RecordingSessionController, SessionError, SessionState, SessionUpdate, StopReason};
