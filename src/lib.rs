pub mod audio;
pub mod config;
pub mod correction;
pub mod error;
pub mod http;
pub mod nats;
pub mod recognizer;
pub mod session;

pub use audio::{AudioCapture, AudioCaptureConfig, AudioCaptureFactory, AudioFrame};
pub use config::Config;
pub use correction::{BoundedCorrector, Correction, Corrector, HeuristicCorrector, Tone};
pub use error::{ErrorKind, RecognizerError, SessionError};
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsTransport, TranscriptMessage};
pub use recognizer::{
    BackendKind, BackendPreference, BackendRegistry, CloudRecognizer, LocalRecognizer,
    RecognizerBackend, RecognizerEvent,
};
pub use session::{SessionConfig, SessionOutcome, SessionSnapshot, SessionState, VoiceSessionController};
