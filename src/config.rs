use crate::recognizer::BackendPreference;
use crate::session::{RestartPolicy, SessionConfig};
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionDefaults,
    pub local: LocalConfig,
    pub cloud: Option<CloudConfig>,
    pub correction: CorrectionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-session".to_string(),
            log_level: "info".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Session defaults; callers may override per session
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub language: String,
    pub silence_timeout_ms: u64,
    pub max_duration_ms: u64,
    pub max_empty_restarts: u32,
    pub interim_results: bool,
    pub backend: BackendPreference,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            language: defaults.language,
            silence_timeout_ms: defaults.silence_timeout.as_millis() as u64,
            max_duration_ms: defaults.max_duration.as_millis() as u64,
            max_empty_restarts: defaults.restart.max_empty_restarts,
            interim_results: defaults.interim_results,
            backend: defaults.backend,
        }
    }
}

impl SessionDefaults {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            language: self.language.clone(),
            silence_timeout: Duration::from_millis(self.silence_timeout_ms),
            max_duration: Duration::from_millis(self.max_duration_ms),
            restart: RestartPolicy {
                max_empty_restarts: self.max_empty_restarts,
            },
            interim_results: self.interim_results,
            backend: self.backend,
        }
    }
}

/// On-device engine settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Locales the on-device engine recognizes
    pub languages: Vec<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
        }
    }
}

/// Streaming recognition over NATS
#[derive(Debug, Deserialize)]
pub struct CloudConfig {
    pub nats_url: String,
    /// Locales the service accepts; empty lets the service decide
    #[serde(default)]
    pub languages: Vec<String>,
    /// Input device name; default input when absent
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Request subject of the correction service; heuristic only when absent
    pub subject: Option<String>,
    pub timeout_ms: u64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            subject: None,
            timeout_ms: 8000,
        }
    }
}

impl Config {
    /// Load from `<path>.{toml,yaml,json}` (optional) and `VOICE_SESSION__*` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICE_SESSION").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
