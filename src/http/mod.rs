//! HTTP API for driving listening sessions from a UI
//!
//! - POST /sessions/start - Start a session (stops any active one)
//! - POST /sessions/stop - Stop the active session, discarding its result
//! - GET /sessions/status - Snapshot of the current session
//! - GET /sessions/:id/outcome - Final transcript or error of a session
//! - POST /corrections - Sentence correction with bounded latency
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{CorrectionRequest, StartSessionRequest, StartSessionResponse};
pub use routes::create_router;
pub use state::{AppState, OutcomeLog, OutcomeRecord, MAX_TRACKED_OUTCOMES};
