use super::backend::{BackendKind, RecognizerBackend, RecognizerConfig, RecognizerEvent};
use crate::error::{ErrorKind, RecognizerError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Failure reported by a local engine when it cannot begin
#[derive(Debug, Clone)]
pub struct EngineError {
    /// Web-speech style error code ("not-allowed", "audio-capture", ...)
    pub code: String,
    pub message: String,
}

impl EngineError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// On-device speech engine with a synchronous callback API
///
/// The engine owns the microphone between `begin` and either its own `end`
/// callback or `abort`.
pub trait LocalEngine: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, language: &str) -> bool;

    /// Start listening; results are reported through `sink`
    fn begin(
        &mut self,
        language: &str,
        interim_results: bool,
        sink: EngineSink,
    ) -> Result<(), EngineError>;

    /// Stop listening immediately and release the microphone
    fn abort(&mut self);
}

/// Callback handle given to a `LocalEngine` for one run
///
/// Every sink carries the generation of the run it was created for; once the
/// recognizer has moved on (stopped or restarted) the sink goes quiet.
#[derive(Clone)]
pub struct EngineSink {
    tx: mpsc::UnboundedSender<RecognizerEvent>,
    generation: u64,
    current: Arc<AtomicU64>,
    capturing: Arc<AtomicBool>,
}

impl EngineSink {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn emit(&self, event: RecognizerEvent) {
        if !self.is_current() {
            debug!("Dropping stale engine event from run {}: {:?}", self.generation, event);
            return;
        }
        let _ = self.tx.send(event);
    }

    /// Audio capture began
    pub fn started(&self) {
        self.emit(RecognizerEvent::Started);
    }

    /// A recognition result; `is_final` marks the end of an utterance
    pub fn result(&self, text: &str, is_final: bool) {
        let text = text.to_string();
        if is_final {
            self.emit(RecognizerEvent::Final(text));
        } else {
            self.emit(RecognizerEvent::Interim(text));
        }
    }

    /// An engine error, by code
    pub fn error(&self, code: &str, message: &str) {
        match ErrorKind::from_code(code) {
            None => debug!("Engine run {} aborted", self.generation),
            Some(kind) if kind.is_retryable() => {
                // Turn-taking is decided by the session's silence timer
                debug!("Engine reported no speech ({}), ignoring", message);
            }
            Some(kind) => self.emit(RecognizerEvent::Error(RecognizerError::new(kind, message))),
        }
    }

    /// The engine stopped on its own and released the microphone
    pub fn end(&self) {
        if self.is_current() {
            self.capturing.store(false, Ordering::SeqCst);
        }
        self.emit(RecognizerEvent::Ended);
    }
}

/// Recognizer backed by an on-device engine
pub struct LocalRecognizer {
    engine: Box<dyn LocalEngine>,
    generation: Arc<AtomicU64>,
    capturing: Arc<AtomicBool>,
}

impl LocalRecognizer {
    pub fn new(engine: impl LocalEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            generation: Arc::new(AtomicU64::new(0)),
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl RecognizerBackend for LocalRecognizer {
    async fn start(
        &mut self,
        language: &str,
        config: &RecognizerConfig,
    ) -> Result<mpsc::UnboundedReceiver<RecognizerEvent>, RecognizerError> {
        if self.is_capturing() {
            warn!("Local engine already running, stopping previous run");
            self.stop().await?;
        }

        if !self.engine.supports(language) {
            return Err(RecognizerError::unsupported_language(language));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EngineSink {
            tx,
            generation,
            current: Arc::clone(&self.generation),
            capturing: Arc::clone(&self.capturing),
        };

        info!(
            "Starting local engine {} for {} (session {}, run {})",
            self.engine.name(),
            language,
            config.session_id,
            generation
        );

        self.capturing.store(true, Ordering::SeqCst);
        if let Err(e) = self.engine.begin(language, config.interim_results, sink) {
            self.capturing.store(false, Ordering::SeqCst);
            self.generation.fetch_add(1, Ordering::SeqCst);
            let kind = ErrorKind::from_code(&e.code)
                .filter(|k| !k.is_retryable())
                .unwrap_or(ErrorKind::NetworkFailure);
            return Err(RecognizerError::new(kind, e.message));
        }

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        // Invalidate the current sink before aborting so the abort's own
        // end callback is not reported
        self.generation.fetch_add(1, Ordering::SeqCst);

        if self.capturing.swap(false, Ordering::SeqCst) {
            info!("Stopping local engine {}", self.engine.name());
            self.engine.abort();
        }

        Ok(())
    }

    fn is_supported(&self, language: &str) -> bool {
        self.engine.supports(language)
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn name(&self) -> &str {
        self.engine.name()
    }
}

impl Drop for LocalRecognizer {
    fn drop(&mut self) {
        if self.capturing.swap(false, Ordering::SeqCst) {
            self.engine.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Engine that hands its sink back to the test
    struct FakeEngine {
        sink: Arc<Mutex<Option<EngineSink>>>,
        aborts: Arc<AtomicU64>,
        begin_error: Option<EngineError>,
    }

    impl LocalEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        fn supports(&self, language: &str) -> bool {
            language.starts_with("en")
        }

        fn begin(&mut self, _: &str, _: bool, sink: EngineSink) -> Result<(), EngineError> {
            if let Some(e) = self.begin_error.clone() {
                return Err(e);
            }
            sink.started();
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn abort(&mut self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.error("aborted", "aborted by client");
                sink.end();
            }
        }
    }

    type SinkSlot = Arc<Mutex<Option<EngineSink>>>;

    fn recognizer(begin_error: Option<EngineError>) -> (LocalRecognizer, SinkSlot, Arc<AtomicU64>) {
        let sink = Arc::new(Mutex::new(None));
        let aborts = Arc::new(AtomicU64::new(0));
        let engine = FakeEngine {
            sink: Arc::clone(&sink),
            aborts: Arc::clone(&aborts),
            begin_error,
        };
        (LocalRecognizer::new(engine), sink, aborts)
    }

    fn config() -> RecognizerConfig {
        RecognizerConfig {
            session_id: "test".to_string(),
            stream_id: "test-1".to_string(),
            interim_results: true,
        }
    }

    #[tokio::test]
    async fn test_results_are_forwarded_in_order() {
        let (mut rec, sink, _) = recognizer(None);
        let mut rx = rec.start("en-US", &config()).await.unwrap();
        assert!(rec.is_capturing());

        let sink = sink.lock().unwrap().clone().unwrap();
        sink.result("hel", false);
        sink.result("hello", true);
        sink.end();

        assert_eq!(rx.recv().await, Some(RecognizerEvent::Started));
        assert_eq!(rx.recv().await, Some(RecognizerEvent::Interim("hel".into())));
        assert_eq!(rx.recv().await, Some(RecognizerEvent::Final("hello".into())));
        assert_eq!(rx.recv().await, Some(RecognizerEvent::Ended));
        assert!(!rec.is_capturing(), "natural end releases the microphone");
    }

    #[tokio::test]
    async fn test_no_speech_is_swallowed() {
        let (mut rec, sink, _) = recognizer(None);
        let mut rx = rec.start("en-US", &config()).await.unwrap();
        let sink = sink.lock().unwrap().clone().unwrap();

        sink.error("no-speech", "nothing heard");
        sink.error("not-allowed", "denied");

        assert_eq!(rx.recv().await, Some(RecognizerEvent::Started));
        match rx.recv().await {
            Some(RecognizerEvent::Error(e)) => assert_eq!(e.kind, ErrorKind::PermissionDenied),
            other => panic!("expected permission error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_silences_stale_sink() {
        let (mut rec, slot, aborts) = recognizer(None);
        let mut rx = rec.start("en-US", &config()).await.unwrap();
        let sink = slot.lock().unwrap().clone().unwrap();

        rec.stop().await.unwrap();
        rec.stop().await.unwrap();
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
        assert!(!rec.is_capturing());

        sink.result("late", true);
        assert_eq!(rx.recv().await, Some(RecognizerEvent::Started));
        drop(sink);
        drop(slot);
        drop(rec);
        assert_eq!(rx.recv().await, None, "no events after stop");
    }

    #[tokio::test]
    async fn test_unsupported_language_rejected() {
        let (mut rec, _, _) = recognizer(None);
        let err = rec.start("ja-JP", &config()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedLanguage);
        assert!(!rec.is_capturing());
    }

    #[tokio::test]
    async fn test_begin_failure_maps_error_code() {
        let (mut rec, _, _) = recognizer(Some(EngineError::new("audio-capture", "no device")));
        let err = rec.start("en-US", &config()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoMicrophone);
        assert!(!rec.is_capturing());
    }
}
