use super::state::SessionState;
use crate::recognizer::BackendKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a listening session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub state: SessionState,

    pub backend: BackendKind,

    pub language: String,

    /// Latest known text
    pub transcript: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of transparent backend restarts
    pub restarts: u32,
}

impl SessionSnapshot {
    /// Refresh the duration against the wall clock
    pub(crate) fn touch(mut self) -> Self {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        self.duration_secs = elapsed.num_milliseconds() as f64 / 1000.0;
        self
    }
}
