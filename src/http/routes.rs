use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/stop", post(handlers::stop_session))
        // Session queries
        .route("/sessions/status", get(handlers::session_status))
        .route(
            "/sessions/:session_id/outcome",
            get(handlers::session_outcome),
        )
        // Sentence correction
        .route("/corrections", post(handlers::correct_text))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
