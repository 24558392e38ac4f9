use super::config::SessionConfig;
use super::state::{Session, SessionAction, SessionEvent, SessionOutcome};
use super::stats::SessionSnapshot;
use crate::error::SessionError;
use crate::recognizer::{
    BackendKind, BackendRegistry, RecognizerBackend, RecognizerConfig, RecognizerEvent,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Handle to a started session
///
/// Resolves to the session's single outcome, or to `None` when the session
/// was stopped by the caller (or superseded by a newer session).
pub struct SessionTicket {
    id: String,
    backend: BackendKind,
    outcome: oneshot::Receiver<SessionOutcome>,
}

impl SessionTicket {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Wait for the final transcript or error
    pub async fn outcome(self) -> Option<SessionOutcome> {
        self.outcome.await.ok()
    }
}

struct ActiveSession {
    id: String,
    cancelled: Arc<AtomicBool>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl ActiveSession {
    /// Close the session and wait until its backend has been released
    async fn shutdown(self) -> SessionSnapshot {
        let ActiveSession {
            id,
            cancelled,
            stop_tx,
            task,
            snapshot,
        } = self;

        // Nothing reaches the caller after this point
        cancelled.store(true, Ordering::SeqCst);
        let _ = stop_tx.send(());

        if let Err(e) = task.await {
            error!("Session {} task panicked: {}", id, e);
        }

        let snapshot = snapshot.read().await.clone();
        snapshot
    }
}

/// Owns the lifecycle of listening sessions, one at a time
///
/// Each session runs on its own task, which holds the selected backend for the
/// session's lifetime. Starting a new session stops the previous one and waits
/// for its backend to release the microphone first.
pub struct VoiceSessionController {
    registry: BackendRegistry,
    defaults: SessionConfig,
    active: Mutex<Option<ActiveSession>>,
}

impl VoiceSessionController {
    pub fn new(registry: BackendRegistry, defaults: SessionConfig) -> Self {
        Self {
            registry,
            defaults,
            active: Mutex::new(None),
        }
    }

    /// Default session configuration, as a starting point for `start`
    pub fn defaults(&self) -> &SessionConfig {
        &self.defaults
    }

    /// Start a listening session, stopping any session still active
    pub async fn start(&self, config: SessionConfig) -> Result<SessionTicket, SessionError> {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            info!("Stopping session {} before starting a new one", previous.id);
            previous.shutdown().await;
        }

        let (kind, backend) = self
            .registry
            .select(&config.language, config.backend)
            .await?;
        let backend = backend.lock_owned().await;

        let id = format!("voice-{}", uuid::Uuid::new_v4());
        info!(
            "Starting session {} ({}, {} backend)",
            id, config.language, kind
        );

        let snapshot = Arc::new(RwLock::new(SessionSnapshot {
            session_id: id.clone(),
            state: Default::default(),
            backend: kind,
            language: config.language.clone(),
            transcript: String::new(),
            started_at: Utc::now(),
            duration_secs: 0.0,
            restarts: 0,
        }));

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let driver = SessionDriver {
            session: Session::new(id.clone(), kind, &config),
            backend,
            recognizer_config: RecognizerConfig {
                session_id: id.clone(),
                stream_id: id.clone(),
                interim_results: config.interim_results,
            },
            events: None,
            run: 0,
            outcome: Some(outcome_tx),
            cancelled: Arc::clone(&cancelled),
            snapshot: Arc::clone(&snapshot),
        };
        let task = tokio::spawn(driver.run(stop_rx));

        *active = Some(ActiveSession {
            id: id.clone(),
            cancelled,
            stop_tx,
            task,
            snapshot,
        });

        Ok(SessionTicket {
            id,
            backend: kind,
            outcome: outcome_rx,
        })
    }

    /// Stop the current session; nothing further is delivered for it.
    ///
    /// Returns the session's last snapshot, or `None` if there was no session.
    pub async fn stop(&self) -> Option<SessionSnapshot> {
        let previous = self.active.lock().await.take()?;
        info!("Stopping session {}", previous.id);
        Some(previous.shutdown().await)
    }

    /// Current (or most recent) session status
    pub async fn status(&self) -> Option<SessionSnapshot> {
        let active = self.active.lock().await;
        let session = active.as_ref()?;
        let snapshot = session.snapshot.read().await.clone();

        if snapshot.state.is_active() {
            Some(snapshot.touch())
        } else {
            Some(snapshot)
        }
    }
}

/// What woke the driver
enum Wake {
    Stop,
    MaxDuration,
    Silence,
    Recognizer(Option<RecognizerEvent>),
}

/// Runs one session: the only place its state changes
struct SessionDriver {
    session: Session,
    backend: OwnedMutexGuard<Box<dyn RecognizerBackend>>,
    recognizer_config: RecognizerConfig,
    /// Events of the current backend run; replaced on every (re)start
    events: Option<mpsc::UnboundedReceiver<RecognizerEvent>>,
    run: u32,
    outcome: Option<oneshot::Sender<SessionOutcome>>,
    cancelled: Arc<AtomicBool>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl SessionDriver {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut queue = VecDeque::from([SessionEvent::Start]);
        let mut outcomes = Vec::new();

        loop {
            while let Some(event) = queue.pop_front() {
                let actions = self.session.handle(event, Instant::now());
                for action in actions {
                    match action {
                        SessionAction::Deliver(outcome) => outcomes.push(outcome),
                        action => {
                            if let Some(follow_up) = self.perform(action).await {
                                queue.push_back(follow_up);
                            }
                        }
                    }
                }
            }

            // Status reflects the final state before the caller hears about it
            self.publish().await;
            for outcome in outcomes.drain(..) {
                self.deliver(outcome);
            }

            if self.session.is_closed() {
                break;
            }

            let event = self.next_event(&mut stop_rx).await;
            queue.push_back(event);
        }

        // Release on every exit path, even if the machine already did
        if self.backend.is_capturing() {
            self.release().await;
        }

        debug!(
            "Session {} finished in {:?} after {} backend runs",
            self.session.id(),
            self.session.state(),
            self.run
        );
    }

    async fn perform(&mut self, action: SessionAction) -> Option<SessionEvent> {
        match action {
            SessionAction::StartBackend => self.start_backend().await,
            SessionAction::RestartBackend => {
                self.release().await;
                self.start_backend().await
            }
            SessionAction::ReleaseBackend => {
                self.release().await;
                None
            }
            // Collected by `run` and sent after the snapshot is published
            SessionAction::Deliver(_) => None,
        }
    }

    async fn start_backend(&mut self) -> Option<SessionEvent> {
        self.run += 1;
        self.recognizer_config.stream_id = format!("{}-{}", self.session.id(), self.run);
        debug!(
            "Session {} starting {} backend (run {})",
            self.session.id(),
            self.backend.name(),
            self.run
        );

        match self
            .backend
            .start(self.session.language(), &self.recognizer_config)
            .await
        {
            Ok(events) => {
                self.events = Some(events);
                None
            }
            Err(e) => {
                error!("Session {} backend failed to start: {}", self.session.id(), e);
                Some(SessionEvent::BackendStartFailed(e))
            }
        }
    }

    async fn release(&mut self) {
        // Drop the run's channel first so late events are never read
        self.events = None;
        if let Err(e) = self.backend.stop().await {
            warn!("Session {} backend failed to stop: {}", self.session.id(), e);
        }
    }

    fn deliver(&mut self, outcome: SessionOutcome) {
        if self.cancelled.load(Ordering::SeqCst) {
            debug!("Session {} was stopped, dropping {:?}", self.session.id(), outcome);
            return;
        }

        if let Some(tx) = self.outcome.take() {
            info!("Session {} outcome: {:?}", self.session.id(), outcome);
            let _ = tx.send(outcome);
        }
    }

    async fn next_event(&mut self, stop_rx: &mut oneshot::Receiver<()>) -> SessionEvent {
        let max_deadline = self.session.max_deadline();
        let silence_deadline = self.session.silence_deadline();

        let wake = tokio::select! {
            biased;
            _ = stop_rx => Wake::Stop,
            _ = sleep_until_opt(max_deadline) => Wake::MaxDuration,
            _ = sleep_until_opt(silence_deadline) => Wake::Silence,
            event = recv_opt(&mut self.events) => Wake::Recognizer(event),
        };

        match wake {
            Wake::Stop => SessionEvent::Stop,
            Wake::MaxDuration => SessionEvent::MaxDurationElapsed,
            Wake::Silence => SessionEvent::SilenceElapsed,
            Wake::Recognizer(Some(RecognizerEvent::Ended)) | Wake::Recognizer(None) => {
                // One end per run, whether announced or a closed channel
                self.events = None;
                SessionEvent::BackendEnded
            }
            Wake::Recognizer(Some(event)) => event.into(),
        }
    }

    async fn publish(&self) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.state = self.session.state();
        snapshot.transcript = self.session.transcript().to_string();
        snapshot.restarts = self.session.restarts();
        if self.session.is_closed() {
            let elapsed = Utc::now().signed_duration_since(snapshot.started_at);
            snapshot.duration_secs = elapsed.num_milliseconds() as f64 / 1000.0;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_opt(
    events: &mut Option<mpsc::UnboundedReceiver<RecognizerEvent>>,
) -> Option<RecognizerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
