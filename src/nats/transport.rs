use super::client::NatsClient;
use super::messages::{ControlAction, TranscriptMessage};
use crate::audio::AudioFrame;
use crate::error::{ErrorKind, RecognizerError};
use crate::recognizer::backend::language_in;
use crate::recognizer::cloud::{CloudMessage, CloudTransport};
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cloud recognition over NATS
///
/// Audio goes out on `audio.frame.<stream>`, transcripts come back on
/// `stt.text.>` and are routed by the `session_id` in their payload. Each
/// backend run opens its own stream id and that id is what goes on the wire as
/// `session_id`, so replies to an earlier run of the same session never match.
pub struct NatsTransport {
    client: Arc<NatsClient>,
    languages: Vec<String>,
    streams: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl NatsTransport {
    /// `languages` lists what the service accepts; empty means let the
    /// service decide and report `language-not-supported` itself.
    pub fn new(client: Arc<NatsClient>, languages: Vec<String>) -> Self {
        Self {
            client,
            languages,
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn to_cloud_message(transcript: TranscriptMessage) -> Vec<CloudMessage> {
        if let Some(code) = transcript.error_code.as_deref() {
            let kind = ErrorKind::from_code(code).unwrap_or(ErrorKind::NetworkFailure);
            let message = transcript.error.unwrap_or_else(|| code.to_string());
            return vec![CloudMessage::Failed { kind, message }];
        }

        let mut messages = Vec::with_capacity(2);
        if !transcript.text.is_empty() {
            messages.push(CloudMessage::Transcript {
                text: transcript.text,
                partial: transcript.partial,
                confidence: transcript.confidence,
            });
        }
        if transcript.end_of_stream {
            messages.push(CloudMessage::Closed);
        }
        messages
    }

    fn take_stream(&self, stream_id: &str) -> Option<JoinHandle<()>> {
        self.streams
            .lock()
            .map(|mut streams| streams.remove(stream_id))
            .unwrap_or(None)
    }

    /// Forward the transcripts addressed to `stream_id` until the stream closes
    async fn route_transcripts<S, P>(
        mut payloads: S,
        stream_id: String,
        tx: mpsc::Sender<CloudMessage>,
    ) where
        S: Stream<Item = P> + Unpin,
        P: AsRef<[u8]>,
    {
        while let Some(payload) = payloads.next().await {
            let transcript = match serde_json::from_slice::<TranscriptMessage>(payload.as_ref()) {
                Ok(transcript) => transcript,
                Err(e) => {
                    warn!("Failed to parse transcript message: {}", e);
                    continue;
                }
            };

            if transcript.session_id != stream_id {
                debug!("Dropping transcript for stream {}", transcript.session_id);
                continue;
            }

            for message in Self::to_cloud_message(transcript) {
                let closing = !matches!(message, CloudMessage::Transcript { .. });
                if tx.send(message).await.is_err() || closing {
                    return;
                }
            }
        }

        let _ = tx
            .send(CloudMessage::Failed {
                kind: ErrorKind::NetworkFailure,
                message: "transcript subscription closed".to_string(),
            })
            .await;
    }
}

#[async_trait::async_trait]
impl CloudTransport for NatsTransport {
    fn supports(&self, language: &str) -> bool {
        self.languages.is_empty() || language_in(&self.languages, language)
    }

    async fn open(
        &self,
        stream_id: &str,
        language: &str,
    ) -> Result<mpsc::Receiver<CloudMessage>, RecognizerError> {
        // Subscribe before asking for the stream so no early transcript is missed
        let subscriber = self
            .client
            .subscribe_transcripts()
            .await
            .map_err(|e| RecognizerError::network(e.to_string()))?;

        self.client
            .publish_control(stream_id, ControlAction::Start, Some(language))
            .await
            .map_err(|e| RecognizerError::network(e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        let payloads = subscriber.map(|msg| msg.payload);
        let task = tokio::spawn(Self::route_transcripts(payloads, stream_id.to_string(), tx));

        if let Ok(mut streams) = self.streams.lock() {
            if let Some(previous) = streams.insert(stream_id.to_string(), task) {
                previous.abort();
            }
        }

        info!("Opened recognition stream {} ({})", stream_id, language);
        Ok(rx)
    }

    async fn send_audio(
        &self,
        stream_id: &str,
        frame: &AudioFrame,
        sequence: u32,
    ) -> Result<(), RecognizerError> {
        self.client
            .publish_audio_frame(
                stream_id,
                &frame.pcm_bytes(),
                frame.sample_rate,
                frame.channels,
                sequence,
                false,
            )
            .await
            .map_err(|e| RecognizerError::network(e.to_string()))
    }

    async fn close(&self, stream_id: &str) -> Result<(), RecognizerError> {
        if let Some(task) = self.take_stream(stream_id) {
            task.abort();
        }

        // Empty final frame marks the end of audio for the service
        self.client
            .publish_audio_frame(stream_id, &[], 16000, 1, 0, true)
            .await
            .map_err(|e| RecognizerError::network(e.to_string()))?;

        self.client
            .publish_control(stream_id, ControlAction::Stop, None)
            .await
            .map_err(|e| RecognizerError::network(e.to_string()))?;

        debug!("Closed recognition stream {}", stream_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(text: &str, partial: bool) -> TranscriptMessage {
        TranscriptMessage {
            session_id: "s1".to_string(),
            text: text.to_string(),
            partial,
            timestamp: "2026-10-19T10:00:00Z".to_string(),
            confidence: Some(0.9),
            end_of_stream: false,
            error_code: None,
            error: None,
        }
    }

    #[test]
    fn test_partial_and_final_transcripts() {
        let messages = NatsTransport::to_cloud_message(transcript("hel", true));
        assert_eq!(
            messages,
            vec![CloudMessage::Transcript {
                text: "hel".to_string(),
                partial: true,
                confidence: Some(0.9)
            }]
        );

        let mut last = transcript("hello there", false);
        last.end_of_stream = true;
        let messages = NatsTransport::to_cloud_message(last);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], CloudMessage::Closed);
    }

    #[test]
    fn test_service_error_code() {
        let mut msg = transcript("", false);
        msg.error_code = Some("language-not-supported".to_string());
        msg.error = Some("xx-XX unavailable".to_string());

        let messages = NatsTransport::to_cloud_message(msg);
        assert_eq!(
            messages,
            vec![CloudMessage::Failed {
                kind: ErrorKind::UnsupportedLanguage,
                message: "xx-XX unavailable".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_end_of_stream_only_closes() {
        let mut msg = transcript("", false);
        msg.end_of_stream = true;
        assert_eq!(NatsTransport::to_cloud_message(msg), vec![CloudMessage::Closed]);
    }

    fn payload(msg: &TranscriptMessage) -> Vec<u8> {
        serde_json::to_vec(msg).expect("serialize transcript")
    }

    #[tokio::test]
    async fn test_earlier_run_end_of_stream_is_dropped() {
        let mut stale = transcript("", false);
        stale.session_id = "voice-x-1".to_string();
        stale.end_of_stream = true;

        let mut current = transcript("hello", false);
        current.session_id = "voice-x-2".to_string();

        let payloads = futures::stream::iter(vec![payload(&stale), payload(&current)]);
        let (tx, mut rx) = mpsc::channel(8);
        NatsTransport::route_transcripts(payloads, "voice-x-2".to_string(), tx).await;

        assert_eq!(
            rx.recv().await,
            Some(CloudMessage::Transcript {
                text: "hello".to_string(),
                partial: false,
                confidence: Some(0.9)
            })
        );
        // Subscription ran dry without an end from this run
        assert!(matches!(
            rx.recv().await,
            Some(CloudMessage::Failed { kind: ErrorKind::NetworkFailure, .. })
        ));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_routing_stops_after_own_end_of_stream() {
        let mut end = transcript("", false);
        end.session_id = "voice-x-2".to_string();
        end.end_of_stream = true;

        let mut after = transcript("late", false);
        after.session_id = "voice-x-2".to_string();

        let payloads = futures::stream::iter(vec![
            b"not json".to_vec(),
            payload(&end),
            payload(&after),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        NatsTransport::route_transcripts(payloads, "voice-x-2".to_string(), tx).await;

        assert_eq!(rx.recv().await, Some(CloudMessage::Closed));
        assert_eq!(rx.recv().await, None);
    }
}
