//! Listening session management
//!
//! This module provides the `VoiceSessionController` abstraction that manages:
//! - Backend selection and microphone exclusivity (one session at a time)
//! - Turn-taking: silence timeout after a final result
//! - Transparent backend restarts when the recognizer stops early
//! - Maximum session duration
//! - Delivery of exactly one final transcript or error per session

mod config;
mod controller;
mod state;
mod stats;

pub use config::{RestartPolicy, SessionConfig};
pub use controller::{SessionTicket, VoiceSessionController};
pub use state::{Session, SessionAction, SessionEvent, SessionOutcome, SessionState};
pub use stats::SessionSnapshot;
