use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_session::audio::{AudioCaptureConfig, AudioCaptureFactory};
use voice_session::correction::{BoundedCorrector, HeuristicCorrector, NatsCorrector};
use voice_session::recognizer::{ReplayEngine, ReplayScript};
use voice_session::{
    create_router, AppState, BackendRegistry, CloudRecognizer, Config, LocalRecognizer,
    NatsClient, NatsTransport, SessionOutcome, VoiceSessionController,
};

#[derive(Parser)]
#[command(name = "voice-session", version, about = "Voice input sessions with turn-taking")]
struct Cli {
    /// Config file path, without extension
    #[arg(long, global = true, default_value = "config/voice-session")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control API
    Serve {
        /// Register a scripted local engine (useful without an on-device recognizer)
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Run one session against a scripted local engine and print its outcome
    Replay {
        script: PathBuf,

        /// Override the configured session language
        #[arg(long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { replay } => serve(cfg, replay).await,
        Command::Replay { script, language } => replay(cfg, script, language).await,
    }
}

async fn serve(cfg: Config, replay: Option<PathBuf>) -> Result<()> {
    let mut registry = BackendRegistry::new();

    if let Some(path) = replay {
        let script = ReplayScript::load(&path)?;
        info!("Local backend: replaying {}", path.display());
        registry = registry.with_local(LocalRecognizer::new(ReplayEngine::new(
            script,
            &cfg.local.languages,
        )));
    }

    let mut nats = None;
    if let Some(cloud) = &cfg.cloud {
        let client = Arc::new(
            NatsClient::connect(&cloud.nats_url)
                .await
                .with_context(|| format!("Failed to connect to NATS at {}", cloud.nats_url))?,
        );
        let transport = NatsTransport::new(Arc::clone(&client), cloud.languages.clone());
        let device = cloud.device.clone();
        registry = registry.with_cloud(CloudRecognizer::new(transport, move || {
            AudioCaptureFactory::microphone(device.clone(), AudioCaptureConfig::default())
        }));
        info!("Cloud backend: NATS at {}", cloud.nats_url);
        nats = Some(client);
    }

    if registry.is_empty() {
        bail!("No recognition backend configured: set [cloud] or pass --replay");
    }

    let controller = Arc::new(VoiceSessionController::new(
        registry,
        cfg.session.to_session_config(),
    ));
    let mut state = AppState::new(controller);

    match (&cfg.correction.subject, nats) {
        (Some(subject), Some(client)) => {
            info!("Correction service on {}", subject);
            let timeout = Duration::from_millis(cfg.correction.timeout_ms);
            state = state.with_corrector(Arc::new(BoundedCorrector::new(
                NatsCorrector::new(client, subject.clone()),
                timeout,
            )));
        }
        (Some(subject), None) => {
            warn!("Correction subject {} needs [cloud] NATS settings, using heuristics", subject);
        }
        _ => {}
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}

async fn replay(cfg: Config, script: PathBuf, language: Option<String>) -> Result<()> {
    let script = ReplayScript::load(&script)?;
    let registry = BackendRegistry::new().with_local(LocalRecognizer::new(ReplayEngine::new(
        script,
        &cfg.local.languages,
    )));

    let mut session = cfg.session.to_session_config();
    if let Some(language) = language {
        session = session.with_language(language);
    }
    let language = session.language.clone();

    let controller = VoiceSessionController::new(registry, session.clone());
    let ticket = controller.start(session).await?;
    info!("Session {} listening ({})", ticket.id(), language);

    match ticket.outcome().await {
        Some(SessionOutcome::FinalTranscript { text }) => {
            println!("final: {}", text);
            let correction = HeuristicCorrector.apply(&text);
            if correction.corrected != text {
                println!("corrected: {}", correction.corrected);
            }
        }
        Some(SessionOutcome::Error { kind, message }) => {
            println!("error ({:?}): {}", kind, message);
        }
        None => println!("stopped"),
    }

    if let Some(snapshot) = controller.status().await {
        info!(
            "Session ran {:.1}s with {} restarts",
            snapshot.duration_secs, snapshot.restarts
        );
    }

    Ok(())
}
