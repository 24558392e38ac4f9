use super::messages::{AudioFrameMessage, ControlAction, ControlMessage};
use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use tracing::{debug, info};

/// Subject the STT service publishes partial and final transcripts on
pub const TRANSCRIPT_SUBJECT: &str = "stt.text.>";

pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Ask the STT service to open or close a recognition stream
    pub async fn publish_control(
        &self,
        session_id: &str,
        action: ControlAction,
        language: Option<&str>,
    ) -> Result<()> {
        let subject = match action {
            ControlAction::Start => "stt.control.start",
            ControlAction::Stop => "stt.control.stop",
        };

        let message = ControlMessage {
            session_id: session_id.to_string(),
            action,
            language: language.map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .context("Failed to publish control message")?;

        info!("Published {:?} for session {} to {}", action, session_id, subject);

        Ok(())
    }

    /// Publish audio frame to NATS
    pub async fn publish_audio_frame(
        &self,
        session_id: &str,
        pcm_bytes: &[u8],
        sample_rate: u32,
        channels: u16,
        sequence: u32,
        is_final: bool,
    ) -> Result<()> {
        let subject = format!("audio.frame.{}", session_id);

        let message = AudioFrameMessage {
            session_id: session_id.to_string(),
            sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
            sample_rate,
            channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: is_final,
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish audio frame")?;

        debug!(
            "Published audio frame to {} (seq={}, bytes={}, final={})",
            subject,
            sequence,
            pcm_bytes.len(),
            is_final
        );

        Ok(())
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self) -> Result<async_nats::Subscriber> {
        // The service publishes to stt.text.partial and stt.text.final;
        // callers filter by session_id in the message payload
        info!("Subscribing to transcripts on {}", TRANSCRIPT_SUBJECT);

        let subscriber = self
            .client
            .subscribe(TRANSCRIPT_SUBJECT.to_string())
            .await
            .context("Failed to subscribe to transcripts")?;

        Ok(subscriber)
    }

    /// Send a request and wait for the reply payload
    pub async fn request(&self, subject: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
        let reply = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .with_context(|| format!("Request on {} failed", subject))?;

        Ok(reply.payload.to_vec())
    }
}
