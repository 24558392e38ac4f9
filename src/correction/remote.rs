use super::{Correction, CorrectionError, CorrectionItem, CorrectionSource, Corrector, Tone};
use crate::nats::NatsClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CorrectionRequest<'a> {
    text: &'a str,
    source_language: &'a str,
    tone: Tone,
}

#[derive(Debug, Deserialize)]
struct CorrectionReply {
    corrected: String,
    #[serde(default)]
    corrections: Vec<CorrectionItem>,
}

/// Correction service reached by NATS request/reply
pub struct NatsCorrector {
    client: Arc<NatsClient>,
    subject: String,
}

impl NatsCorrector {
    pub fn new(client: Arc<NatsClient>, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl Corrector for NatsCorrector {
    fn name(&self) -> &str {
        "nats-corrector"
    }

    async fn correct(
        &self,
        text: &str,
        source_language: &str,
        tone: Tone,
    ) -> Result<Correction, CorrectionError> {
        let request = CorrectionRequest {
            text,
            source_language,
            tone,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| CorrectionError::InvalidReply(e.to_string()))?;

        debug!("Requesting correction on {} ({} bytes)", self.subject, payload.len());

        let reply = self
            .client
            .request(&self.subject, payload)
            .await
            .map_err(|e| CorrectionError::Unavailable(format!("{:#}", e)))?;

        let reply: CorrectionReply = serde_json::from_slice(&reply)
            .map_err(|e| CorrectionError::InvalidReply(e.to_string()))?;

        Ok(Correction {
            corrected: reply.corrected,
            corrections: reply.corrections,
            source: CorrectionSource::Service,
        })
    }
}
