//! Speech recognizer backends
//!
//! Two recognition APIs behind one `RecognizerBackend` interface:
//! - `LocalRecognizer` wraps an on-device engine with synchronous callbacks
//! - `CloudRecognizer` streams microphone audio to a recognition service
//!
//! `BackendRegistry` chooses between them per requested language.

pub mod backend;
pub mod cloud;
pub mod local;
pub mod registry;
pub mod replay;

pub use backend::{BackendKind, RecognizerBackend, RecognizerConfig, RecognizerEvent};
pub use cloud::{CloudMessage, CloudRecognizer, CloudTransport};
pub use local::{EngineError, EngineSink, LocalEngine, LocalRecognizer};
pub use registry::{BackendPreference, BackendRegistry, SharedBackend};
pub use replay::{ReplayEngine, ReplayScript};
