use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classes of failure a listening session can end with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user or OS refused microphone access
    PermissionDenied,
    /// No capture device is available
    NoMicrophone,
    /// The recognition service could not be reached or dropped the stream
    NetworkFailure,
    /// The requested locale is not recognized by any backend
    UnsupportedLanguage,
    /// Nothing was said (absorbed by restarts until the retry bound is hit)
    NoSpeechDetected,
    /// The session ran past its maximum duration
    SessionTimeout,
}

impl ErrorKind {
    /// Whether the controller absorbs this kind through a backend restart
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::NoSpeechDetected)
    }

    /// Human-readable message suitable for showing to the user
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "Microphone permission denied",
            ErrorKind::NoMicrophone => "No microphone available",
            ErrorKind::NetworkFailure => "Speech service unavailable",
            ErrorKind::UnsupportedLanguage => "Language not supported",
            ErrorKind::NoSpeechDetected => "No speech detected",
            ErrorKind::SessionTimeout => "Listening timeout",
        }
    }

    /// Map a recognizer error code (web-speech vocabulary) to an error kind.
    ///
    /// Returns `None` for `aborted`, which is not a failure: an end event follows it.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "aborted" => None,
            "no-speech" => Some(ErrorKind::NoSpeechDetected),
            "not-allowed" | "service-not-allowed" => Some(ErrorKind::PermissionDenied),
            "audio-capture" => Some(ErrorKind::NoMicrophone),
            "language-not-supported" => Some(ErrorKind::UnsupportedLanguage),
            // "network" and anything we don't know are service-side
            _ => Some(ErrorKind::NetworkFailure),
        }
    }
}

/// Error reported by a recognizer backend or its audio capture
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", .kind.description(), .message)]
pub struct RecognizerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RecognizerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn no_microphone(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoMicrophone, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailure, message)
    }

    pub fn unsupported_language(language: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedLanguage,
            format!("language '{}' is not supported", language),
        )
    }

    pub fn no_speech(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSpeechDetected, message)
    }
}

/// Errors returned synchronously by the session controller
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No recognizer backend supports language '{0}'")]
    UnsupportedLanguage(String),

    #[error("Requested backend '{0}' is not registered")]
    BackendUnavailable(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::UnsupportedLanguage(_) | SessionError::BackendUnavailable(_) => {
                ErrorKind::UnsupportedLanguage
            }
        }
    }
}
