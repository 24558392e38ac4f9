use super::backend::{BackendKind, RecognizerBackend, RecognizerConfig, RecognizerEvent};
use crate::audio::{AudioCapture, AudioFrame};
use crate::error::{ErrorKind, RecognizerError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Message received from a streaming recognition service
#[derive(Debug, Clone, PartialEq)]
pub enum CloudMessage {
    /// Recognized text; `partial` marks interim results
    Transcript {
        text: String,
        partial: bool,
        confidence: Option<f32>,
    },
    /// The service closed the stream (end of turn)
    Closed,
    /// The service reported an error
    Failed { kind: ErrorKind, message: String },
}

/// Transport to a streaming recognition service
#[async_trait::async_trait]
pub trait CloudTransport: Send + Sync {
    /// Whether the service accepts this locale
    fn supports(&self, language: &str) -> bool;

    /// Open a recognition stream for one backend run
    async fn open(
        &self,
        stream_id: &str,
        language: &str,
    ) -> Result<mpsc::Receiver<CloudMessage>, RecognizerError>;

    /// Forward one frame of microphone audio
    async fn send_audio(
        &self,
        stream_id: &str,
        frame: &AudioFrame,
        sequence: u32,
    ) -> Result<(), RecognizerError>;

    /// Close the stream; the service may still be flushing
    async fn close(&self, stream_id: &str) -> Result<(), RecognizerError>;
}

type CaptureFactory = dyn Fn() -> Result<Box<dyn AudioCapture>, RecognizerError> + Send + Sync;

/// Recognizer that streams microphone audio to a service
///
/// The microphone is opened on `start` and released on `stop`, on drop, and
/// before `start` returns an error.
pub struct CloudRecognizer<T: CloudTransport> {
    transport: Arc<T>,
    capture_factory: Box<CaptureFactory>,
    capture: Option<Box<dyn AudioCapture>>,
    stream_id: Option<String>,
    pump: Option<JoinHandle<()>>,
}

impl<T: CloudTransport + 'static> CloudRecognizer<T> {
    pub fn new<F>(transport: T, capture_factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn AudioCapture>, RecognizerError> + Send + Sync + 'static,
    {
        Self {
            transport: Arc::new(transport),
            capture_factory: Box::new(capture_factory),
            capture: None,
            stream_id: None,
            pump: None,
        }
    }

    /// Forward audio to the service and service messages to the session
    async fn pump(
        transport: Arc<T>,
        stream_id: String,
        mut frames: mpsc::Receiver<AudioFrame>,
        mut messages: mpsc::Receiver<CloudMessage>,
        events: mpsc::UnboundedSender<RecognizerEvent>,
    ) {
        let _ = events.send(RecognizerEvent::Started);
        let mut sequence: u32 = 0;

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = transport.send_audio(&stream_id, &frame, sequence).await {
                            error!("Failed to forward audio frame {}: {}", sequence, e);
                            let _ = events.send(RecognizerEvent::Error(e));
                            break;
                        }
                        sequence = sequence.wrapping_add(1);
                    }
                    None => {
                        let _ = events.send(RecognizerEvent::Error(
                            RecognizerError::no_microphone("microphone stream closed"),
                        ));
                        break;
                    }
                },
                message = messages.recv() => match message {
                    Some(CloudMessage::Transcript { text, partial, confidence }) => {
                        debug!("Transcript (partial={}, confidence={:?}): {}", partial, confidence, text);
                        let event = if partial {
                            RecognizerEvent::Interim(text)
                        } else {
                            RecognizerEvent::Final(text)
                        };
                        let _ = events.send(event);
                    }
                    Some(CloudMessage::Failed { kind, message }) => {
                        if kind.is_retryable() {
                            debug!("Service reported no speech ({}), ignoring", message);
                            continue;
                        }
                        let _ = events.send(RecognizerEvent::Error(RecognizerError::new(kind, message)));
                        break;
                    }
                    Some(CloudMessage::Closed) | None => {
                        let _ = events.send(RecognizerEvent::Ended);
                        break;
                    }
                },
            }
        }

        debug!("Cloud pump for stream {} finished after {} frames", stream_id, sequence);
    }
}

#[async_trait::async_trait]
impl<T: CloudTransport + 'static> RecognizerBackend for CloudRecognizer<T> {
    async fn start(
        &mut self,
        language: &str,
        config: &RecognizerConfig,
    ) -> Result<mpsc::UnboundedReceiver<RecognizerEvent>, RecognizerError> {
        if self.capture.is_some() || self.pump.is_some() {
            warn!("Cloud recognizer already running, stopping previous run");
            self.stop().await?;
        }

        if !self.transport.supports(language) {
            return Err(RecognizerError::unsupported_language(language));
        }

        info!(
            "Starting cloud recognizer for {} (session {}, stream {})",
            language, config.session_id, config.stream_id
        );

        let mut capture = (self.capture_factory)()?;
        let frames = capture.start().await?;

        let messages = match self.transport.open(&config.stream_id, language).await {
            Ok(messages) => messages,
            Err(e) => {
                if let Err(stop_err) = capture.stop().await {
                    warn!("Failed to release microphone: {}", stop_err);
                }
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(Self::pump(
            Arc::clone(&self.transport),
            config.stream_id.clone(),
            frames,
            messages,
            tx,
        ));

        self.capture = Some(capture);
        self.stream_id = Some(config.stream_id.clone());
        self.pump = Some(pump);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        if let Some(stream_id) = self.stream_id.take() {
            info!("Stopping cloud recognizer (stream {})", stream_id);
            if let Err(e) = self.transport.close(&stream_id).await {
                warn!("Failed to close recognition stream: {}", e);
            }
        }

        if let Some(mut capture) = self.capture.take() {
            capture.stop().await?;
        }

        Ok(())
    }

    fn is_supported(&self, language: &str) -> bool {
        self.transport.supports(language)
    }

    fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| c.is_capturing())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn name(&self) -> &str {
        "cloud"
    }
}

impl<T: CloudTransport> Drop for CloudRecognizer<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        // Dropping the capture releases the device
        self.capture.take();
    }
}
