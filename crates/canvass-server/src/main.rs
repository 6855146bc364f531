//! Canvass server binary — the entry point for the voice-survey orchestrator.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, background session eviction, and graceful shutdown on
//! SIGTERM/SIGINT.

use canvass_db::{DbSettings, ResponseStore};
use canvass_flow::{QuestionCatalog, SurveyController, SurveyScript};
use canvass_server::{app, background, config, telephony::TwilioClient, AppState};
use canvass_types::Question;
use canvass_voice::{JudgeService, SttService, SynthesisEngine, TtsService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("CANVASS_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn synthesis_engine(name: &str) -> SynthesisEngine {
    match name {
        "piper" => SynthesisEngine::Piper,
        "system" | "espeak" => SynthesisEngine::System,
        other => {
            tracing::warn!(engine = other, "unknown synthesis engine, using piper");
            SynthesisEngine::Piper
        }
    }
}

fn survey_script(survey: &config::SurveyConfig) -> SurveyScript {
    let mut script = SurveyScript::default();
    if let Some(greeting) = &survey.greeting {
        script.greeting = greeting.clone();
    }
    if let Some(closing) = &survey.closing {
        script.closing = closing.clone();
    }
    if let Some(apology) = &survey.apology {
        script.apology = apology.clone();
    }
    if let Some(reprompt) = &survey.reprompt {
        script.reprompt = reprompt.clone();
    }
    if let Some(transition) = &survey.transition {
        script.transition = transition.clone();
    }
    script
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = canvass_db::create_pool(
        &config.database.path,
        DbSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            canvass_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let store = ResponseStore::new(pool);

    // Collaborators
    let stt = SttService::new(&config.speech.binary_path, &config.speech.model_path);
    let tts = TtsService::new(
        synthesis_engine(&config.synthesis.engine),
        &config.synthesis.binary_path,
        &config.synthesis.model_path,
        &config.synthesis.media_dir,
    );
    let judge = JudgeService::new(canvass_voice::JudgeConfig {
        api_base_url: config.judge.api_base_url.clone(),
        api_key: config.judge.api_key.clone(),
        model: config.judge.model.clone(),
        timeout_secs: config.judge.timeout_secs,
    })
    .expect("failed to build judgement client — check [judge] in config");

    // Survey catalog and controller
    let questions: Vec<Question> = config
        .survey
        .questions
        .iter()
        .map(|q| Question::new(q.id.clone(), q.prompt.clone()))
        .collect();
    let catalog = QuestionCatalog::new(questions)
        .expect("survey.questions must contain at least one question");

    tracing::info!(
        questions = catalog.len(),
        max_attempts = ?config.survey.max_attempts,
        "survey catalog loaded"
    );

    let controller = Arc::new(SurveyController::new(
        catalog,
        survey_script(&config.survey),
        config.survey.max_attempts,
        Arc::new(stt),
        Arc::new(judge),
        Arc::new(store.clone()),
    ));

    let twilio = Arc::new(
        TwilioClient::new(
            &config.telephony.api_base_url,
            &config.telephony.account_sid,
            &config.telephony.auth_token,
            &config.telephony.caller_number,
        )
        .expect("failed to build telephony client — check [telephony] in config"),
    );

    let state = AppState {
        controller: controller.clone(),
        tts: Arc::new(tts),
        store: Arc::new(store),
        telephony: twilio.clone(),
        recordings: twilio,
        public_url: config.server.public_url.clone(),
    };

    // Background session eviction
    tokio::spawn(background::start_session_eviction_task(
        controller,
        config.survey.idle_timeout_secs,
    ));

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, public_url = %config.server.public_url, "starting canvass server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("canvass server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
