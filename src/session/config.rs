use crate::recognizer::BackendPreference;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bound on transparent backend restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// How many consecutive empty backend ends are answered with a restart.
    /// The next empty end fails the session with `NoSpeechDetected`.
    pub max_empty_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_empty_restarts: 2,
        }
    }
}

/// Configuration for a listening session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Locale tag to recognize (e.g., "en-US")
    pub language: String,

    /// Quiet period after a final result that ends the user's turn
    /// Default: 3 seconds
    pub silence_timeout: Duration,

    /// Hard cap on the whole session, never extended by speech
    /// Default: 30 seconds
    pub max_duration: Duration,

    pub restart: RestartPolicy,

    /// Ask the backend for interim results
    pub interim_results: bool,

    pub backend: BackendPreference,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            silence_timeout: Duration::from_secs(3),
            max_duration: Duration::from_secs(30),
            restart: RestartPolicy::default(),
            interim_results: true,
            backend: BackendPreference::Auto,
        }
    }
}

impl SessionConfig {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_duration = max;
        self
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }
}
