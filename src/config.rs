use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::persona::DEFAULT_PERSONA;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AkiraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub completion: CompletionConfig,
    pub conversation: ConversationConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub webhook_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `"json"` (one file per user) or `"sqlite"`.
    pub backend: String,
    pub dir: String,
    pub db_path: String,
    pub on_save_error: SaveErrorPolicy,
}

/// What the orchestrator does when persisting a turn fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveErrorPolicy {
    /// Log at `warn` and still hand the reply back.
    #[default]
    Log,
    /// Return the storage error to the caller.
    Fail,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompletionConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub analysis_temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    pub persona: String,
    /// Number of recent user/assistant pairs sent along with each request.
    pub history_window: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MediaConfig {
    pub max_reply_chars: usize,
    pub ocr_command: String,
    pub ocr_language: String,
    pub vision_min_chars: usize,
    pub download_timeout_secs: u64,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            log_level: "info".into(),
            webhook_path: "/whatsapp".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_akira_dir();
        Self {
            backend: "json".into(),
            dir: base.join("users").to_string_lossy().into_owned(),
            db_path: base.join("akira.db").to_string_lossy().into_owned(),
            on_save_error: SaveErrorPolicy::Log,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            temperature: 0.6,
            analysis_temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.into(),
            history_window: 6,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_reply_chars: 1400,
            ocr_command: "tesseract".into(),
            ocr_language: "spa".into(),
            vision_min_chars: 120,
            download_timeout_secs: 30,
            twilio_account_sid: None,
            twilio_auth_token: None,
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MediaConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Returns `~/.akira/`, or `./.akira/` when no home directory is known.
pub fn default_akira_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".akira")
}

/// Returns the default config file path: `~/.akira/config.toml`
pub fn default_config_path() -> PathBuf {
    default_akira_dir().join("config.toml")
}

impl AkiraConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AkiraConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AKIRA_STORE_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("AKIRA_STORE_DIR") {
            self.storage.dir = val;
        }
        if let Ok(val) = std::env::var("AKIRA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("AKIRA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("AKIRA_MODEL") {
            self.completion.model = val;
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.completion.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("OPENAI_BASE_URL") {
            self.completion.base_url = val;
        }
        if let Ok(val) = std::env::var("TWILIO_ACCOUNT_SID") {
            self.media.twilio_account_sid = Some(val);
        }
        if let Ok(val) = std::env::var("TWILIO_AUTH_TOKEN") {
            self.media.twilio_auth_token = Some(val);
        }
        if let Some(val) = parse_env("MAX_REPLY_CHARS") {
            self.media.max_reply_chars = val;
        }
        if let Some(val) = parse_env("PORT") {
            self.server.port = val;
        }
    }

    /// Resolve the JSON store directory, expanding `~` if needed.
    pub fn resolved_store_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.dir)
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(val) => Some(val),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
