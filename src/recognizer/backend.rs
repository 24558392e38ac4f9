use crate::error::RecognizerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Which recognizer family is handling a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// On-device recognizer with synchronous callbacks
    Local,
    /// Streaming recognition service
    Cloud,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Cloud => write!(f, "cloud"),
        }
    }
}

/// Event emitted by a recognizer while it is running
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    /// Audio capture is live
    Started,
    /// Provisional text for the utterance in progress
    Interim(String),
    /// Text the backend considers complete for the current utterance
    Final(String),
    /// Backend failure
    Error(RecognizerError),
    /// The backend stopped on its own
    Ended,
}

/// Per-run recognizer configuration
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Session the run belongs to
    pub session_id: String,
    /// Identifies this run alone; changes on every (re)start so services can
    /// route transcripts to it and late replies to an earlier run are dropped
    pub stream_id: String,
    /// Whether interim results should be reported
    pub interim_results: bool,
}

/// Speech recognizer backend trait
///
/// Implementations:
/// - `LocalRecognizer`: on-device engine with synchronous callbacks
/// - `CloudRecognizer`: microphone audio streamed to a recognition service
///
/// Events are delivered on the returned channel; one channel per `start`.
#[async_trait::async_trait]
pub trait RecognizerBackend: Send + Sync {
    /// Begin capturing and recognizing speech
    async fn start(
        &mut self,
        language: &str,
        config: &RecognizerConfig,
    ) -> Result<mpsc::UnboundedReceiver<RecognizerEvent>, RecognizerError>;

    /// Stop recognizing and release the microphone. Idempotent.
    async fn stop(&mut self) -> Result<(), RecognizerError>;

    /// Whether this backend can recognize the given locale
    fn is_supported(&self, language: &str) -> bool;

    /// Check if backend is currently holding the microphone
    fn is_capturing(&self) -> bool;

    fn kind(&self) -> BackendKind;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Match a locale tag against a configured list.
///
/// Comparison is case-insensitive; an entry holding only a primary subtag
/// (`"en"`) covers every region of that language (`"en-GB"`).
pub fn language_in(supported: &[String], language: &str) -> bool {
    let language = language.trim();
    let primary = language.split(['-', '_']).next().unwrap_or(language);

    supported.iter().any(|entry| {
        entry.eq_ignore_ascii_case(language)
            || (!entry.contains(['-', '_']) && entry.eq_ignore_ascii_case(primary))
    })
}
