use super::backend::{BackendKind, RecognizerBackend};
use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A backend shared between sessions; a running session holds the lock
pub type SharedBackend = Arc<Mutex<Box<dyn RecognizerBackend>>>;

/// Which backend a caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Local if it supports the language, otherwise cloud
    #[default]
    Auto,
    Local,
    Cloud,
}

/// The recognizer backends available to a controller
#[derive(Default)]
pub struct BackendRegistry {
    local: Option<SharedBackend>,
    cloud: Option<SharedBackend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, backend: impl RecognizerBackend + 'static) -> Self {
        self.local = Some(Arc::new(Mutex::new(Box::new(backend))));
        self
    }

    pub fn with_cloud(mut self, backend: impl RecognizerBackend + 'static) -> Self {
        self.cloud = Some(Arc::new(Mutex::new(Box::new(backend))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_none() && self.cloud.is_none()
    }

    fn get(&self, kind: BackendKind) -> Option<&SharedBackend> {
        match kind {
            BackendKind::Local => self.local.as_ref(),
            BackendKind::Cloud => self.cloud.as_ref(),
        }
    }

    /// Pick the backend for a language
    ///
    /// Support is asked of the backends themselves. Must not be called while a
    /// session still holds a backend.
    pub async fn select(
        &self,
        language: &str,
        preference: BackendPreference,
    ) -> Result<(BackendKind, SharedBackend), SessionError> {
        let order: &[BackendKind] = match preference {
            BackendPreference::Auto => &[BackendKind::Local, BackendKind::Cloud],
            BackendPreference::Local => &[BackendKind::Local],
            BackendPreference::Cloud => &[BackendKind::Cloud],
        };

        let mut registered = false;
        for &kind in order {
            let Some(backend) = self.get(kind) else {
                continue;
            };
            registered = true;

            if backend.lock().await.is_supported(language) {
                debug!("Selected {} backend for {}", kind, language);
                return Ok((kind, Arc::clone(backend)));
            }
            debug!("{} backend does not support {}", kind, language);
        }

        if !registered && preference != BackendPreference::Auto {
            return Err(SessionError::BackendUnavailable(format!("{:?}", preference).to_lowercase()));
        }

        Err(SessionError::UnsupportedLanguage(language.to_string()))
    }
}
