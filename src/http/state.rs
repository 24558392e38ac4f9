use crate::correction::{Corrector, HeuristicCorrector};
use crate::error::ErrorKind;
use crate::session::{SessionOutcome, SessionTicket, VoiceSessionController};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// What the HTTP layer knows about a session's result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeRecord {
    Pending,
    Final { text: String },
    Error { kind: ErrorKind, message: String },
    /// Stopped by a caller or superseded; no result will follow
    Stopped,
}

impl From<Option<SessionOutcome>> for OutcomeRecord {
    fn from(outcome: Option<SessionOutcome>) -> Self {
        match outcome {
            Some(SessionOutcome::FinalTranscript { text }) => OutcomeRecord::Final { text },
            Some(SessionOutcome::Error { kind, message }) => OutcomeRecord::Error { kind, message },
            None => OutcomeRecord::Stopped,
        }
    }
}

/// Outcomes kept for lookup; older sessions are forgotten
pub const MAX_TRACKED_OUTCOMES: usize = 64;

/// Outcome records of the most recent sessions, oldest evicted first
#[derive(Debug)]
pub struct OutcomeLog {
    records: HashMap<String, OutcomeRecord>,
    order: VecDeque<String>,
    limit: usize,
}

impl OutcomeLog {
    pub fn new(limit: usize) -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Start tracking a session, evicting the oldest past the limit
    pub fn insert(&mut self, session_id: String, record: OutcomeRecord) {
        if self.records.insert(session_id.clone(), record).is_some() {
            return;
        }
        self.order.push_back(session_id);

        while self.order.len() > self.limit {
            if let Some(oldest) = self.order.pop_front() {
                debug!("Forgetting outcome of session {}", oldest);
                self.records.remove(&oldest);
            }
        }
    }

    /// Update a tracked session; false if it was already evicted
    pub fn resolve(&mut self, session_id: &str, record: OutcomeRecord) -> bool {
        match self.records.get_mut(session_id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&OutcomeRecord> {
        self.records.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<VoiceSessionController>,

    /// Results of recent sessions, filled in as they finish
    pub outcomes: Arc<RwLock<OutcomeLog>>,

    pub corrector: Arc<dyn Corrector>,
}

impl AppState {
    pub fn new(controller: Arc<VoiceSessionController>) -> Self {
        Self {
            controller,
            outcomes: Arc::new(RwLock::new(OutcomeLog::new(MAX_TRACKED_OUTCOMES))),
            corrector: Arc::new(HeuristicCorrector),
        }
    }

    pub fn with_corrector(mut self, corrector: Arc<dyn Corrector>) -> Self {
        self.corrector = corrector;
        self
    }

    /// Keep at most `limit` session outcomes
    pub fn with_outcome_limit(mut self, limit: usize) -> Self {
        self.outcomes = Arc::new(RwLock::new(OutcomeLog::new(limit)));
        self
    }

    /// Record the ticket as pending and collect its outcome in the background
    pub async fn track(&self, ticket: SessionTicket) {
        let id = ticket.id().to_string();
        self.outcomes
            .write()
            .await
            .insert(id.clone(), OutcomeRecord::Pending);

        let outcomes = Arc::clone(&self.outcomes);
        tokio::spawn(async move {
            let record = OutcomeRecord::from(ticket.outcome().await);
            debug!("Session {} resolved: {:?}", id, record);
            if !outcomes.write().await.resolve(&id, record) {
                debug!("Session {} resolved after its outcome was evicted", id);
            }
        });
    }

    pub async fn outcome(&self, session_id: &str) -> Option<OutcomeRecord> {
        self.outcomes.read().await.get(session_id).cloned()
    }
}
