// Shared test doubles for driving the controller without a microphone

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use voice_session::recognizer::{
    backend::language_in, BackendKind, RecognizerBackend, RecognizerConfig, RecognizerEvent,
};
use voice_session::RecognizerError;

/// Ordered record of backend calls, shared between backends of one test
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Test-side handle of a `ScriptedBackend`: feeds events into the current run
#[derive(Clone)]
pub struct Feed {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<RecognizerEvent>>>>,
    starts: watch::Receiver<u32>,
    streams: Arc<Mutex<Vec<String>>>,
    log: CallLog,
}

impl Feed {
    /// Send an event to the running backend; false if no run is active
    pub fn send(&self, event: RecognizerEvent) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn interim(&self, text: &str) -> bool {
        self.send(RecognizerEvent::Interim(text.to_string()))
    }

    pub fn final_text(&self, text: &str) -> bool {
        self.send(RecognizerEvent::Final(text.to_string()))
    }

    pub fn end(&self) -> bool {
        self.send(RecognizerEvent::Ended)
    }

    /// Wait until the backend has been started `count` times in total
    pub async fn started(&mut self, count: u32) {
        self.starts
            .wait_for(|&starts| starts >= count)
            .await
            .expect("backend dropped");
    }

    pub fn starts(&self) -> u32 {
        *self.starts.borrow()
    }

    pub fn log(&self) -> Vec<String> {
        calls(&self.log)
    }

    /// Stream ids handed to each `start`, oldest first
    pub fn streams(&self) -> Vec<String> {
        self.streams.lock().unwrap().clone()
    }
}

/// Backend whose events are pushed by the test through a `Feed`
pub struct ScriptedBackend {
    name: String,
    kind: BackendKind,
    languages: Vec<String>,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<RecognizerEvent>>>>,
    starts: watch::Sender<u32>,
    streams: Arc<Mutex<Vec<String>>>,
    start_error: Option<RecognizerError>,
    capturing: bool,
    log: CallLog,
}

impl ScriptedBackend {
    pub fn new(name: &str, kind: BackendKind, languages: &[&str], log: CallLog) -> (Self, Feed) {
        let sender = Arc::new(Mutex::new(None));
        let (starts_tx, starts_rx) = watch::channel(0);
        let streams = Arc::new(Mutex::new(Vec::new()));

        let backend = Self {
            name: name.to_string(),
            kind,
            languages: languages.iter().map(|l| l.to_string()).collect(),
            sender: Arc::clone(&sender),
            starts: starts_tx,
            streams: Arc::clone(&streams),
            start_error: None,
            capturing: false,
            log: Arc::clone(&log),
        };
        let feed = Feed {
            sender,
            starts: starts_rx,
            streams,
            log,
        };

        (backend, feed)
    }

    pub fn local(languages: &[&str], log: CallLog) -> (Self, Feed) {
        Self::new("local", BackendKind::Local, languages, log)
    }

    pub fn cloud(languages: &[&str], log: CallLog) -> (Self, Feed) {
        Self::new("cloud", BackendKind::Cloud, languages, log)
    }

    /// Every `start` fails with this error
    pub fn failing(mut self, error: RecognizerError) -> Self {
        self.start_error = Some(error);
        self
    }

    fn record(&self, call: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, call));
    }
}

#[async_trait::async_trait]
impl RecognizerBackend for ScriptedBackend {
    async fn start(
        &mut self,
        language: &str,
        config: &RecognizerConfig,
    ) -> Result<mpsc::UnboundedReceiver<RecognizerEvent>, RecognizerError> {
        self.record(&format!("start {}", language));
        self.streams.lock().unwrap().push(config.stream_id.clone());

        if let Some(error) = &self.start_error {
            self.starts.send_modify(|starts| *starts += 1);
            return Err(error.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);
        self.capturing = true;
        self.starts.send_modify(|starts| *starts += 1);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        if self.capturing {
            self.record("stop");
        }
        self.sender.lock().unwrap().take();
        self.capturing = false;
        Ok(())
    }

    fn is_supported(&self, language: &str) -> bool {
        self.languages.is_empty() || language_in(&self.languages, language)
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }
}
