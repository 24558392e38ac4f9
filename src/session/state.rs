//! Listening session state machine
//!
//! `Session::handle` is a pure transition function: it takes one event and the
//! current time and returns the actions the driver must perform. Timers are not
//! owned here; the driver sleeps until `silence_deadline` / `max_deadline`.

use super::config::{RestartPolicy, SessionConfig};
use crate::error::{ErrorKind, RecognizerError};
use crate::recognizer::{BackendKind, RecognizerEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Listening session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not started
    #[default]
    Idle,
    /// Backend (re)starting
    Starting,
    /// Receiving speech
    Listening,
    /// A final result arrived; waiting for the silence timeout
    AwaitingSilence,
    /// Finished with a transcript, a timeout, or an explicit stop
    Stopped,
    /// Finished with a fatal error
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Errored)
    }

    /// States in which the backend holds the microphone
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Listening | SessionState::AwaitingSilence
        )
    }
}

/// What the caller receives when a session ends on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionOutcome {
    FinalTranscript { text: String },
    Error { kind: ErrorKind, message: String },
}

impl SessionOutcome {
    fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        SessionOutcome::Error {
            kind,
            message: message.into(),
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start,
    BackendStarted,
    Interim(String),
    Final(String),
    /// Error reported by a running backend
    BackendError(RecognizerError),
    /// The backend could not be started (always fatal)
    BackendStartFailed(RecognizerError),
    /// The backend stopped on its own
    BackendEnded,
    SilenceElapsed,
    MaxDurationElapsed,
    /// Explicit stop by the caller
    Stop,
}

impl From<RecognizerEvent> for SessionEvent {
    fn from(event: RecognizerEvent) -> Self {
        match event {
            RecognizerEvent::Started => SessionEvent::BackendStarted,
            RecognizerEvent::Interim(text) => SessionEvent::Interim(text),
            RecognizerEvent::Final(text) => SessionEvent::Final(text),
            RecognizerEvent::Error(e) => SessionEvent::BackendError(e),
            RecognizerEvent::Ended => SessionEvent::BackendEnded,
        }
    }
}

/// Work the driver performs after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    StartBackend,
    /// Stop the backend, then start it again
    RestartBackend,
    ReleaseBackend,
    Deliver(SessionOutcome),
}

/// One listening attempt
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    state: SessionState,
    language: String,
    backend: BackendKind,
    transcript: String,
    started_at: Option<Instant>,
    last_activity_at: Option<Instant>,
    silence_timeout: Duration,
    max_duration: Duration,
    policy: RestartPolicy,
    /// Consecutive backend ends with nothing heard
    empty_ends: u32,
    restarts: u32,
    delivered: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, backend: BackendKind, config: &SessionConfig) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Idle,
            language: config.language.clone(),
            backend,
            transcript: String::new(),
            started_at: None,
            last_activity_at: None,
            silence_timeout: config.silence_timeout,
            max_duration: config.max_duration,
            policy: config.restart,
            empty_ends: 0,
            restarts: 0,
            delivered: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Latest known text
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.last_activity_at
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// When the silence timer fires, if it is armed
    pub fn silence_deadline(&self) -> Option<Instant> {
        if self.state != SessionState::AwaitingSilence {
            return None;
        }
        self.last_activity_at.map(|at| at + self.silence_timeout)
    }

    /// When the session times out, once started
    pub fn max_deadline(&self) -> Option<Instant> {
        self.started_at.map(|at| at + self.max_duration)
    }

    /// Apply one event and return the resulting actions
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Vec<SessionAction> {
        if self.is_closed() {
            tracing::debug!("Session {} closed, ignoring {:?}", self.id, event);
            return Vec::new();
        }

        let previous = self.state;
        let actions = self.transition(event, now);

        if previous != self.state {
            tracing::info!(
                "Session {} state transition: {:?} -> {:?}",
                self.id,
                previous,
                self.state
            );
        }

        actions
    }

    fn transition(&mut self, event: SessionEvent, now: Instant) -> Vec<SessionAction> {
        use SessionAction::*;
        use SessionState::*;

        match (self.state, event) {
            (Idle, SessionEvent::Start) => {
                self.state = Starting;
                self.started_at = Some(now);
                vec![StartBackend]
            }
            (Idle, SessionEvent::Stop) => {
                self.state = Stopped;
                Vec::new()
            }
            (Idle, _) => Vec::new(),

            (_, SessionEvent::Stop) => {
                self.state = Stopped;
                vec![ReleaseBackend]
            }

            (_, SessionEvent::MaxDurationElapsed) => {
                self.finish(Stopped, SessionOutcome::error(ErrorKind::SessionTimeout, "listening timeout"))
            }

            (_, SessionEvent::BackendStartFailed(e)) => self.fail(e),
            (_, SessionEvent::BackendError(e)) if e.kind.is_retryable() => {
                tracing::debug!("Session {} ignoring retryable error: {}", self.id, e);
                Vec::new()
            }
            (_, SessionEvent::BackendError(e)) => self.fail(e),

            (Starting, SessionEvent::BackendStarted) => {
                self.state = Listening;
                Vec::new()
            }
            (_, SessionEvent::BackendStarted) => Vec::new(),

            (_, SessionEvent::Interim(text)) => {
                self.record(text, now);
                self.state = Listening;
                Vec::new()
            }

            (_, SessionEvent::Final(text)) if text.trim().is_empty() => {
                if self.state == Starting {
                    self.state = Listening;
                }
                Vec::new()
            }
            (_, SessionEvent::Final(text)) => {
                self.record(text, now);
                self.state = AwaitingSilence;
                Vec::new()
            }

            (AwaitingSilence, SessionEvent::SilenceElapsed) => {
                // Guard against a timer computed before later activity
                if self.silence_deadline().is_some_and(|deadline| now < deadline) {
                    return Vec::new();
                }
                self.finish_with_transcript()
            }
            (_, SessionEvent::SilenceElapsed) => Vec::new(),

            (_, SessionEvent::BackendEnded) => {
                if !self.transcript.trim().is_empty() {
                    return self.finish_with_transcript();
                }

                self.empty_ends += 1;
                if self.empty_ends > self.policy.max_empty_restarts {
                    return self.finish(
                        Errored,
                        SessionOutcome::error(ErrorKind::NoSpeechDetected, "no speech detected"),
                    );
                }

                self.restarts += 1;
                self.state = Starting;
                tracing::info!(
                    "Session {} backend ended with nothing heard, restarting ({}/{})",
                    self.id,
                    self.empty_ends,
                    self.policy.max_empty_restarts
                );
                vec![RestartBackend]
            }

            (_, SessionEvent::Start) => Vec::new(),
        }
    }

    /// Record recognized text; only recognition events move `last_activity_at`
    fn record(&mut self, text: String, now: Instant) {
        if !text.trim().is_empty() {
            self.empty_ends = 0;
        }
        self.transcript = text;
        self.last_activity_at = Some(now);
    }

    fn fail(&mut self, error: RecognizerError) -> Vec<SessionAction> {
        tracing::warn!("Session {} failed: {}", self.id, error);
        self.finish(
            SessionState::Errored,
            SessionOutcome::error(error.kind, error.message),
        )
    }

    fn finish_with_transcript(&mut self) -> Vec<SessionAction> {
        let text = self.transcript.trim().to_string();
        self.finish(SessionState::Stopped, SessionOutcome::FinalTranscript { text })
    }

    fn finish(&mut self, state: SessionState, outcome: SessionOutcome) -> Vec<SessionAction> {
        self.state = state;
        let mut actions = vec![SessionAction::ReleaseBackend];
        if !self.delivered {
            self.delivered = true;
            actions.push(SessionAction::Deliver(outcome));
        }
        actions
    }
}
