// Tests for the cloud recognizer's stream pump and microphone handling

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use voice_session::audio::{AudioCapture, AudioFrame};
use voice_session::recognizer::{
    CloudMessage, CloudRecognizer, CloudTransport, RecognizerBackend, RecognizerConfig,
    RecognizerEvent,
};
use voice_session::{ErrorKind, RecognizerError};

#[derive(Default)]
struct Microphone {
    starts: u32,
    stops: u32,
    capturing: bool,
    frames: Option<mpsc::Sender<AudioFrame>>,
}

type SharedMicrophone = Arc<Mutex<Microphone>>;

struct FakeCapture {
    mic: SharedMicrophone,
}

#[async_trait::async_trait]
impl AudioCapture for FakeCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, RecognizerError> {
        let (tx, rx) = mpsc::channel(16);
        let mut mic = self.mic.lock().unwrap();
        mic.starts += 1;
        mic.capturing = true;
        mic.frames = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        let mut mic = self.mic.lock().unwrap();
        if mic.capturing {
            mic.stops += 1;
        }
        mic.capturing = false;
        mic.frames = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.mic.lock().unwrap().capturing
    }

    fn name(&self) -> &str {
        "fake-mic"
    }
}

#[derive(Default)]
struct Service {
    opened: Vec<(String, String)>,
    closed: Vec<String>,
    stream: Option<mpsc::Sender<CloudMessage>>,
    refuse: bool,
}

type SharedService = Arc<Mutex<Service>>;

struct FakeTransport {
    service: SharedService,
    languages: Vec<&'static str>,
    audio: mpsc::UnboundedSender<(String, u32, usize)>,
}

#[async_trait::async_trait]
impl CloudTransport for FakeTransport {
    fn supports(&self, language: &str) -> bool {
        self.languages.contains(&language)
    }

    async fn open(
        &self,
        stream_id: &str,
        language: &str,
    ) -> Result<mpsc::Receiver<CloudMessage>, RecognizerError> {
        let mut service = self.service.lock().unwrap();
        if service.refuse {
            return Err(RecognizerError::network("connection refused"));
        }
        let (tx, rx) = mpsc::channel(16);
        service.opened.push((stream_id.to_string(), language.to_string()));
        service.stream = Some(tx);
        Ok(rx)
    }

    async fn send_audio(
        &self,
        stream_id: &str,
        frame: &AudioFrame,
        sequence: u32,
    ) -> Result<(), RecognizerError> {
        let _ = self
            .audio
            .send((stream_id.to_string(), sequence, frame.samples.len()));
        Ok(())
    }

    async fn close(&self, stream_id: &str) -> Result<(), RecognizerError> {
        let mut service = self.service.lock().unwrap();
        service.closed.push(stream_id.to_string());
        service.stream = None;
        Ok(())
    }
}

struct Harness {
    recognizer: CloudRecognizer<FakeTransport>,
    mic: SharedMicrophone,
    service: SharedService,
    audio: mpsc::UnboundedReceiver<(String, u32, usize)>,
}

fn harness() -> Harness {
    let mic = SharedMicrophone::default();
    let service = SharedService::default();
    let (audio_tx, audio_rx) = mpsc::unbounded_channel();

    let transport = FakeTransport {
        service: Arc::clone(&service),
        languages: vec!["en-US", "de-DE"],
        audio: audio_tx,
    };
    let factory_mic = Arc::clone(&mic);
    let recognizer = CloudRecognizer::new(transport, move || {
        Ok(Box::new(FakeCapture {
            mic: Arc::clone(&factory_mic),
        }) as Box<dyn AudioCapture>)
    });

    Harness {
        recognizer,
        mic,
        service,
        audio: audio_rx,
    }
}

fn config(stream_id: &str) -> RecognizerConfig {
    RecognizerConfig {
        session_id: "voice-x".to_string(),
        stream_id: stream_id.to_string(),
        interim_results: true,
    }
}

async fn push(service: &SharedService, message: CloudMessage) {
    let stream = service.lock().unwrap().stream.clone().expect("stream open");
    stream.send(message).await.unwrap();
}

fn transcript(text: &str, partial: bool) -> CloudMessage {
    CloudMessage::Transcript {
        text: text.to_string(),
        partial,
        confidence: Some(0.9),
    }
}

#[tokio::test]
async fn test_transcripts_map_to_recognizer_events() {
    let mut h = harness();
    let mut events = h.recognizer.start("en-US", &config("s1")).await.unwrap();

    assert_eq!(events.recv().await, Some(RecognizerEvent::Started));
    assert!(h.recognizer.is_capturing());
    assert_eq!(
        h.service.lock().unwrap().opened,
        vec![("s1".to_string(), "en-US".to_string())]
    );

    push(&h.service, transcript("guten", true)).await;
    push(&h.service, transcript("guten Tag", false)).await;
    push(&h.service, CloudMessage::Closed).await;

    assert_eq!(events.recv().await, Some(RecognizerEvent::Interim("guten".into())));
    assert_eq!(events.recv().await, Some(RecognizerEvent::Final("guten Tag".into())));
    assert_eq!(events.recv().await, Some(RecognizerEvent::Ended));
    assert_eq!(events.recv().await, None);
}

#[tokio::test]
async fn test_microphone_audio_is_forwarded_in_sequence() {
    let mut h = harness();
    let mut events = h.recognizer.start("en-US", &config("s2")).await.unwrap();
    assert_eq!(events.recv().await, Some(RecognizerEvent::Started));

    let frames = h.mic.lock().unwrap().frames.clone().unwrap();
    for _ in 0..3 {
        frames
            .send(AudioFrame {
                samples: vec![0; 1600],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: 0,
            })
            .await
            .unwrap();
    }

    for expected in 0..3 {
        let (session, sequence, samples) = h.audio.recv().await.unwrap();
        assert_eq!(session, "s2");
        assert_eq!(sequence, expected);
        assert_eq!(samples, 1600);
    }
}

#[tokio::test]
async fn test_stop_releases_microphone_and_closes_stream() {
    let mut h = harness();
    let _events = h.recognizer.start("en-US", &config("s3")).await.unwrap();

    h.recognizer.stop().await.unwrap();
    assert!(!h.recognizer.is_capturing());
    assert_eq!(h.mic.lock().unwrap().stops, 1);
    assert_eq!(h.service.lock().unwrap().closed, vec!["s3".to_string()]);

    // Idempotent
    h.recognizer.stop().await.unwrap();
    assert_eq!(h.mic.lock().unwrap().stops, 1);
    assert_eq!(h.service.lock().unwrap().closed.len(), 1);
}

#[tokio::test]
async fn test_failed_open_releases_microphone() {
    let mut h = harness();
    h.service.lock().unwrap().refuse = true;

    let err = h.recognizer.start("en-US", &config("s4")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkFailure);

    let mic = h.mic.lock().unwrap();
    assert_eq!(mic.starts, 1);
    assert_eq!(mic.stops, 1);
    assert!(!mic.capturing);
    drop(mic);
    assert!(!h.recognizer.is_capturing());
}

#[tokio::test]
async fn test_unsupported_language_never_opens_microphone() {
    let mut h = harness();

    let err = h.recognizer.start("ko-KR", &config("s5")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedLanguage);
    assert_eq!(h.mic.lock().unwrap().starts, 0);
    assert!(!h.recognizer.is_supported("ko-KR"));
    assert!(h.recognizer.is_supported("de-DE"));
}

#[tokio::test]
async fn test_service_no_speech_is_swallowed_and_errors_are_fatal() {
    let mut h = harness();
    let mut events = h.recognizer.start("en-US", &config("s6")).await.unwrap();
    assert_eq!(events.recv().await, Some(RecognizerEvent::Started));

    push(
        &h.service,
        CloudMessage::Failed {
            kind: ErrorKind::NoSpeechDetected,
            message: "no speech".into(),
        },
    )
    .await;
    push(
        &h.service,
        CloudMessage::Failed {
            kind: ErrorKind::NetworkFailure,
            message: "upstream timeout".into(),
        },
    )
    .await;

    assert_eq!(
        events.recv().await,
        Some(RecognizerEvent::Error(RecognizerError::network(
            "upstream timeout"
        )))
    );
    assert_eq!(events.recv().await, None);
}

#[tokio::test]
async fn test_microphone_loss_is_reported() {
    let mut h = harness();
    let mut events = h.recognizer.start("en-US", &config("s7")).await.unwrap();
    assert_eq!(events.recv().await, Some(RecognizerEvent::Started));

    // Device unplugged: the frame channel closes
    h.mic.lock().unwrap().frames = None;

    match events.recv().await {
        Some(RecognizerEvent::Error(e)) => assert_eq!(e.kind, ErrorKind::NoMicrophone),
        other => panic!("expected microphone error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_each_run_opens_its_own_stream() {
    let mut h = harness();
    let mut events = h.recognizer.start("en-US", &config("voice-x-1")).await.unwrap();
    assert_eq!(events.recv().await, Some(RecognizerEvent::Started));
    h.recognizer.stop().await.unwrap();

    let mut events = h.recognizer.start("en-US", &config("voice-x-2")).await.unwrap();
    assert_eq!(events.recv().await, Some(RecognizerEvent::Started));

    let service = h.service.lock().unwrap();
    let opened: Vec<&str> = service.opened.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(opened, vec!["voice-x-1", "voice-x-2"]);
    assert_eq!(service.closed, vec!["voice-x-1".to_string()]);
}
