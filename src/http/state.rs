use crate::pipeline::AssessmentPipeline;
use crate::session::RecordingSessionController;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: RecordingSessionController,

    pub pipeline: Arc<AssessmentPipeline>,

    /// Countdown used when `/session/start` names no duration
    pub default_duration: u32,
}

impl AppState {
    pub fn new(
        controller: RecordingSessionController,
        pipeline: Arc<AssessmentPipeline>,
        default_duration: u32,
    ) -> Self {
        Self {
            controller,
            pipeline,
            default_duration,
        }
    }
}
