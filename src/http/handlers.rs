use super::state::AppState;
use crate::correction::Tone;
use crate::error::{ErrorKind, SessionError};
use crate::recognizer::{BackendKind, BackendPreference};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Locale tag; the configured default when absent
    pub language: Option<String>,

    pub silence_timeout_ms: Option<u64>,

    pub max_duration_ms: Option<u64>,

    pub backend: Option<BackendPreference>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub backend: BackendKind,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub text: String,

    /// Language the speaker was practicing; defaults to the session default
    pub source_language: Option<String>,

    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

fn error_response(status: StatusCode, error: String, kind: Option<ErrorKind>) -> axum::response::Response {
    (status, Json(ErrorResponse { error, kind })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Start a listening session, replacing any active one
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let mut config = state.controller.defaults().clone();
    if let Some(language) = req.language {
        config = config.with_language(language);
    }
    if let Some(ms) = req.silence_timeout_ms {
        config = config.with_silence_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = req.max_duration_ms {
        config = config.with_max_duration(Duration::from_millis(ms));
    }
    if let Some(backend) = req.backend {
        config = config.with_backend(backend);
    }

    info!("Starting session for {}", config.language);

    match state.controller.start(config).await {
        Ok(ticket) => {
            let response = StartSessionResponse {
                session_id: ticket.id().to_string(),
                backend: ticket.backend(),
            };
            state.track(ticket).await;
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e @ SessionError::UnsupportedLanguage(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string(), Some(e.kind()))
        }
        Err(e @ SessionError::BackendUnavailable(_)) => {
            error!("Failed to start session: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string(), Some(e.kind()))
        }
    }
}

/// POST /sessions/stop
/// Stop the active session; its result is discarded
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.stop().await {
        Some(snapshot) => {
            info!("Session {} stopped over HTTP", snapshot.session_id);
            (StatusCode::OK, Json(snapshot)).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "No active session".to_string(), None),
    }
}

/// GET /sessions/status
/// Snapshot of the current (or most recent) session
pub async fn session_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.status().await {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No session".to_string(), None),
    }
}

/// GET /sessions/:session_id/outcome
pub async fn session_outcome(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.outcome(&session_id).await {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
            None,
        ),
    }
}

/// POST /corrections
/// Correct a sentence; falls back to local heuristics when the service is slow
pub async fn correct_text(
    State(state): State<AppState>,
    Json(req): Json<CorrectionRequest>,
) -> impl IntoResponse {
    let language = req
        .source_language
        .unwrap_or_else(|| state.controller.defaults().language.clone());

    match state.corrector.correct(&req.text, &language, req.tone).await {
        Ok(correction) => (StatusCode::OK, Json(correction)).into_response(),
        Err(e) => {
            error!("Correction failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string(), None)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
