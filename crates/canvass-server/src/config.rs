//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telephony vendor credentials and endpoints.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Speech-to-text settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Text-to-speech settings.
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Language-model judgement settings.
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Survey content and flow policy.
    #[serde(default)]
    pub survey: SurveyConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL the telephony vendor reaches this server at
    /// (e.g. an ngrok tunnel during development).
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "canvass_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Telephony vendor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    /// Vendor REST API base URL.
    #[serde(default = "default_telephony_api_base")]
    pub api_base_url: String,

    /// Account identifier. Usually supplied via `TWILIO_ACCOUNT_SID`.
    #[serde(default)]
    pub account_sid: String,

    /// API auth token. Usually supplied via `TWILIO_AUTH_TOKEN`.
    #[serde(default)]
    pub auth_token: String,

    /// The number outbound calls originate from.
    #[serde(default)]
    pub caller_number: String,
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Path to the whisper.cpp binary.
    #[serde(default = "default_stt_binary")]
    pub binary_path: String,

    /// Path to the GGML model file.
    #[serde(default = "default_stt_model")]
    pub model_path: String,
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// Synthesis backend: "piper" or "system" (espeak-ng).
    #[serde(default = "default_tts_engine")]
    pub engine: String,

    /// Path to the synthesis binary. Empty means resolve from PATH.
    #[serde(default)]
    pub binary_path: String,

    /// Path to the voice model (piper only).
    #[serde(default)]
    pub model_path: String,

    /// Directory synthesized prompt audio is written to and served from.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
}

/// Language-model judgement configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    /// Base URL of an OpenAI-compatible chat API.
    #[serde(default = "default_judge_api_base")]
    pub api_base_url: String,

    /// API key. Usually supplied via `CANVASS_JUDGE_API_KEY`.
    #[serde(default)]
    pub api_key: String,

    /// Model name.
    #[serde(default = "default_judge_model")]
    pub model: String,

    /// Per-request bounded wait, in seconds.
    #[serde(default = "default_judge_timeout_secs")]
    pub timeout_secs: u64,
}

/// One catalog entry as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionEntry {
    pub id: String,
    pub prompt: String,
}

/// Survey content and flow policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyConfig {
    /// Spoken once when the call connects. Defaults to the built-in script.
    #[serde(default)]
    pub greeting: Option<String>,

    /// Spoken before hanging up.
    #[serde(default)]
    pub closing: Option<String>,

    /// Prefixed to a repeated question after a collaborator failure.
    #[serde(default)]
    pub apology: Option<String>,

    /// Prefixed to a repeated question after a blank transcription.
    #[serde(default)]
    pub reprompt: Option<String>,

    /// Prefixed to the next question when a retry limit forces advancement.
    #[serde(default)]
    pub transition: Option<String>,

    /// Consecutive unresolved attempts tolerated per question before the
    /// survey moves on. Absent means unlimited.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Sessions with no webhook activity for this long are evicted.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// The ordered question catalog.
    #[serde(default = "default_questions")]
    pub questions: Vec<QuestionEntry>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_db_path() -> String {
    "canvass.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_telephony_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_stt_binary() -> String {
    "assets/whisper/whisper-cli".to_string()
}

fn default_stt_model() -> String {
    "assets/whisper/ggml-base.en.bin".to_string()
}

fn default_tts_engine() -> String {
    "piper".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_judge_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_judge_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_judge_timeout_secs() -> u64 {
    20
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_questions() -> Vec<QuestionEntry> {
    [
        ("Q1", "Hi! thanks for joining. First, where are you traveling to?"),
        ("Q2", "When will you be traveling?"),
        ("Q3", "Who are you traveling with?"),
        ("Q4", "What's your top priority for this trip?"),
        ("Q5", "Any special requirements or questions for us?"),
    ]
    .into_iter()
    .map(|(id, prompt)| QuestionEntry {
        id: id.to_string(),
        prompt: prompt.to_string(),
    })
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_telephony_api_base(),
            account_sid: String::new(),
            auth_token: String::new(),
            caller_number: String::new(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            binary_path: default_stt_binary(),
            model_path: default_stt_model(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            engine: default_tts_engine(),
            binary_path: String::new(),
            model_path: String::new(),
            media_dir: default_media_dir(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_judge_api_base(),
            api_key: String::new(),
            model: default_judge_model(),
            timeout_secs: default_judge_timeout_secs(),
        }
    }
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            greeting: None,
            closing: None,
            apology: None,
            reprompt: None,
            transition: None,
            max_attempts: None,
            idle_timeout_secs: default_idle_timeout_secs(),
            questions: default_questions(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CANVASS_HOST` overrides `server.host`
/// - `CANVASS_PORT` overrides `server.port`
/// - `CANVASS_PUBLIC_URL` overrides `server.public_url`
/// - `CANVASS_DB_PATH` overrides `database.path`
/// - `CANVASS_LOG_LEVEL` overrides `logging.level`
/// - `CANVASS_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `TWILIO_ACCOUNT_SID` overrides `telephony.account_sid`
/// - `TWILIO_AUTH_TOKEN` overrides `telephony.auth_token`
/// - `TWILIO_CALLER_NUMBER` overrides `telephony.caller_number`
/// - `CANVASS_JUDGE_API_URL` overrides `judge.api_base_url`
/// - `CANVASS_JUDGE_API_KEY` overrides `judge.api_key`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("CANVASS_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("CANVASS_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(public_url) = std::env::var("CANVASS_PUBLIC_URL") {
        config.server.public_url = public_url;
    }
    if let Ok(db_path) = std::env::var("CANVASS_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("CANVASS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("CANVASS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
        config.telephony.account_sid = sid;
    }
    if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
        config.telephony.auth_token = token;
    }
    if let Ok(number) = std::env::var("TWILIO_CALLER_NUMBER") {
        config.telephony.caller_number = number;
    }
    if let Ok(url) = std::env::var("CANVASS_JUDGE_API_URL") {
        config.judge.api_base_url = url;
    }
    if let Ok(key) = std::env::var("CANVASS_JUDGE_API_KEY") {
        config.judge.api_key = key;
    }

    Ok(config)
}
