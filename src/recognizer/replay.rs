//! Scripted local engine for exercising turn-taking without a microphone

use super::backend::language_in;
use super::local::{EngineError, EngineSink, LocalEngine};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How long an engine run with nothing left to play stays open
const SILENT_RUN: Duration = Duration::from_secs(1);

/// One engine callback, fired `after_ms` after the previous step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(default)]
    pub after_ms: u64,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Interim { text: String },
    Final { text: String },
    Error { code: String, message: String },
    End,
}

/// A replay script: one list of steps per engine run (restarts consume the next run)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub languages: Vec<String>,
    pub runs: Vec<Vec<ScriptStep>>,
}

impl ReplayScript {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse replay script {}", path.display()))
    }
}

/// Local engine that plays back a `ReplayScript`
pub struct ReplayEngine {
    languages: Vec<String>,
    runs: VecDeque<Vec<ScriptStep>>,
    task: Option<JoinHandle<()>>,
}

impl ReplayEngine {
    /// `fallback_languages` applies when the script does not list any
    pub fn new(script: ReplayScript, fallback_languages: &[String]) -> Self {
        let languages = if script.languages.is_empty() {
            fallback_languages.to_vec()
        } else {
            script.languages
        };

        Self {
            languages,
            runs: script.runs.into(),
            task: None,
        }
    }

    async fn play(steps: Vec<ScriptStep>, sink: EngineSink) {
        sink.started();

        for step in steps {
            tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
            match step.event {
                ScriptEvent::Interim { text } => sink.result(&text, false),
                ScriptEvent::Final { text } => sink.result(&text, true),
                ScriptEvent::Error { code, message } => sink.error(&code, &message),
                ScriptEvent::End => {
                    sink.end();
                    return;
                }
            }
        }

        // No end scripted: the engine keeps listening until it is aborted
        std::future::pending::<()>().await;
    }
}

impl LocalEngine for ReplayEngine {
    fn name(&self) -> &str {
        "replay"
    }

    fn supports(&self, language: &str) -> bool {
        language_in(&self.languages, language)
    }

    fn begin(
        &mut self,
        language: &str,
        _interim_results: bool,
        sink: EngineSink,
    ) -> Result<(), EngineError> {
        self.abort();

        let task = match self.runs.pop_front() {
            Some(steps) => {
                info!("Replaying run with {} steps ({})", steps.len(), language);
                tokio::spawn(Self::play(steps, sink))
            }
            None => {
                debug!("Replay script exhausted, playing a silent run");
                tokio::spawn(async move {
                    sink.started();
                    tokio::time::sleep(SILENT_RUN).await;
                    sink.end();
                })
            }
        };

        self.task = Some(task);
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
