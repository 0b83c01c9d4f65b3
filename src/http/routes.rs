use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/session/start", post(handlers::start_session))
        .route("/session/stop", post(handlers::stop_session))
        .route("/session/cancel", post(handlers::cancel_session))
        .route("/session/status", get(handlers::session_status))
        // Assessment of the last completed recording
        .route("/session/assess", post(handlers::assess_session))
        // Request logging, and browser UIs served from another origin
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
