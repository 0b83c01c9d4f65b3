use super::state::AppState;
use crate::audio::AudioRef;
use crate::pipeline::AssessmentOutcome;
use crate::session::{SessionError, SessionState, SessionUpdate, StopReason};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Countdown length (default: configured session duration)
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub audio: AudioRef,
    pub session: SessionUpdate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Worth offering the user another attempt
    pub retryable: bool,
}

/// `SessionError` rendered as a JSON error with a matching status code
struct ApiError(SessionError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SessionError::InvalidDuration => StatusCode::BAD_REQUEST,
            SessionError::PermissionDenied => StatusCode::FORBIDDEN,
            SessionError::Busy(_) | SessionError::NoOp | SessionError::Cancelled => {
                StatusCode::CONFLICT
            }
            SessionError::NoFileProduced => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::CaptureStartFailure(_) | SessionError::CaptureStopFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                retryable: self.0.is_retryable(),
            }),
        )
            .into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// A request without a JSON body uses the configured duration
pub async fn start_session(
    State(state): State<AppState>,
    body: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<SessionUpdate>, Response> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => StartSessionRequest::default(),
        Err(rejection) => {
            warn!("Rejected start request: {}", rejection.body_text());
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: rejection.body_text(),
                    retryable: false,
                }),
            )
                .into_response());
        }
    };
    let duration = req.duration_seconds.unwrap_or(state.default_duration);

    info!("Starting session for {}s", duration);

    if let Err(e) = state.controller.begin(duration).await {
        error!("Failed to start session: {}", e);
        return Err(ApiError::from(e).into_response());
    }

    Ok(Json(state.controller.snapshot().await))
}

/// POST /session/stop
pub async fn stop_session(
    State(state): State<AppState>,
) -> Result<Json<StopSessionResponse>, impl IntoResponse> {
    match state.controller.request_stop(StopReason::UserRequested).await {
        Ok(audio) => Ok(Json(StopSessionResponse {
            audio,
            session: state.controller.snapshot().await,
        })),
        Err(e) => {
            warn!("Stop request failed: {}", e);
            Err(ApiError::from(e))
        }
    }
}

/// POST /session/cancel
pub async fn cancel_session(State(state): State<AppState>) -> Json<SessionUpdate> {
    state.controller.cancel().await;
    Json(state.controller.snapshot().await)
}

/// GET /session/status
pub async fn session_status(State(state): State<AppState>) -> Json<SessionUpdate> {
    Json(state.controller.snapshot().await)
}

/// POST /session/assess
/// Run the pipeline on the recording of the last completed session
pub async fn assess_session(
    State(state): State<AppState>,
) -> Result<Json<AssessmentOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let audio = match state.controller.state().await {
        SessionState::Completed(audio) => audio,
        other => {
            return Err((
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("No completed recording to assess (session {})", other.label()),
                    retryable: false,
                }),
            ))
        }
    };

    Ok(Json(state.pipeline.run(&audio).await))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
