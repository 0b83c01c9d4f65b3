//! HTTP API for driving the recorder from a UI
//!
//! - POST /session/start - Begin a countdown recording
//! - POST /session/stop - Stop early and return the recording
//! - POST /session/cancel - Abandon the session
//! - GET /session/status - Current `SessionUpdate`
//! - POST /session/assess - Transcribe and analyze the completed recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::AppState;
