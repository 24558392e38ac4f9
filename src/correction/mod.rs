//! Sentence correction for finished transcripts
//!
//! The correction service itself is external; this module defines the seam
//! (`Corrector`), a NATS request/reply client for it, and a bounded-latency
//! wrapper that degrades to a local heuristic when the service is slow or down.

mod heuristic;
mod remote;

pub use heuristic::HeuristicCorrector;
pub use remote::NatsCorrector;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Register the corrected sentence should be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Casual,
    #[default]
    Neutral,
    Formal,
}

/// A single change made to the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionItem {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
}

/// Who produced a correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionSource {
    Service,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub corrected: String,
    #[serde(default)]
    pub corrections: Vec<CorrectionItem>,
    pub source: CorrectionSource,
}

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Correction service unavailable: {0}")]
    Unavailable(String),

    #[error("Correction service returned an invalid reply: {0}")]
    InvalidReply(String),
}

/// Sentence-correction service
#[async_trait::async_trait]
pub trait Corrector: Send + Sync {
    fn name(&self) -> &str;

    async fn correct(
        &self,
        text: &str,
        source_language: &str,
        tone: Tone,
    ) -> Result<Correction, CorrectionError>;
}

/// Default latency bound for the correction service
pub const DEFAULT_CORRECTION_TIMEOUT: Duration = Duration::from_secs(8);

/// Wraps a correction service with a latency bound and a local fallback
pub struct BoundedCorrector<C: Corrector> {
    primary: C,
    fallback: HeuristicCorrector,
    timeout: Duration,
}

impl<C: Corrector> BoundedCorrector<C> {
    pub fn new(primary: C, timeout: Duration) -> Self {
        Self {
            primary,
            fallback: HeuristicCorrector,
            timeout,
        }
    }

    /// Correct `text`; never fails, the heuristic answers when the service can't
    pub async fn correct_or_fallback(&self, text: &str, language: &str, tone: Tone) -> Correction {
        match tokio::time::timeout(self.timeout, self.primary.correct(text, language, tone)).await {
            Ok(Ok(correction)) => correction,
            Ok(Err(e)) => {
                warn!("{} failed, using heuristic correction: {}", self.primary.name(), e);
                self.fallback.apply(text)
            }
            Err(_) => {
                warn!(
                    "{} did not answer within {:?}, using heuristic correction",
                    self.primary.name(),
                    self.timeout
                );
                self.fallback.apply(text)
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: Corrector> Corrector for BoundedCorrector<C> {
    fn name(&self) -> &str {
        "bounded"
    }

    async fn correct(
        &self,
        text: &str,
        source_language: &str,
        tone: Tone,
    ) -> Result<Correction, CorrectionError> {
        Ok(self.correct_or_fallback(text, source_language, tone).await)
    }
}
