//! Configuration loading, validation, and management for Pili.
//!
//! Loads configuration from `pili.toml` (path overridable via the
//! `PILI_CONFIG` environment variable) with per-key environment overrides.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure. Maps directly to `pili.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM completion backend settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// MCP tool server settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemorySettings,

    /// Turn execution and session cache settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend kind: "openai" or "local" (any OpenAI-compatible endpoint)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (unused for most local backends)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for local/OpenAI-compatible backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// The tool server endpoint (single JSON-RPC-like POST endpoint)
    #[serde(default = "default_mcp_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            base_url: default_mcp_url(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Backing store: "memory" or "file"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Directory for file-backed conversations
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_max_messages")]
    pub max_messages_per_session: usize,

    #[serde(default = "default_max_chars")]
    pub max_chars_per_message: usize,

    /// How many recent messages to render into the next turn's context
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,

    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,

    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            data_dir: default_data_dir(),
            max_messages_per_session: default_max_messages(),
            max_chars_per_message: default_max_chars(),
            context_messages: default_context_messages(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
            max_age_days: default_max_age_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum completion/tool round-trips per turn (safety limit)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Per-user session cache capacity
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,

    /// Rewrite the raw turn response into a warmer reply with a second
    /// completion pass
    #[serde(default)]
    pub finalize_responses: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            session_capacity: default_session_capacity(),
            finalize_responses: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_mcp_url() -> String {
    "http://localhost:8080/mcp".into()
}
fn default_memory_backend() -> String {
    "file".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data/memory")
}
fn default_max_messages() -> usize {
    100
}
fn default_max_chars() -> usize {
    2000
}
fn default_context_messages() -> usize {
    10
}
fn default_cleanup_interval_hours() -> u64 {
    24
}
fn default_max_age_days() -> i64 {
    30
}
fn default_max_steps() -> u32 {
    25
}
fn default_session_capacity() -> usize {
    100
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("llm", &self.llm)
            .field("mcp", &self.mcp)
            .field("memory", &self.memory)
            .field("runtime", &self.runtime)
            .field("server", &self.server)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: file (if present) + environment overrides.
    ///
    /// The file path is `$PILI_CONFIG` or `./pili.toml`. A missing file is
    /// not an error — defaults plus env overrides apply.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PILI_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("pili.toml"));
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a specific TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply `PILI_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PILI_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("PILI_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("PILI_OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("PILI_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("PILI_MCP_URL") {
            self.mcp.base_url = v;
        }
        if let Ok(v) = std::env::var("PILI_MEMORY_DIR") {
            self.memory.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PILI_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.llm.provider.as_str() {
            "openai" | "local" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown llm.provider '{other}' (expected 'openai' or 'local')"
                )));
            }
        }
        if self.llm.provider == "local" && self.llm.base_url.is_none() {
            return Err(ConfigError::Invalid(
                "llm.base_url is required when llm.provider = 'local'".into(),
            ));
        }
        match self.memory.backend.as_str() {
            "memory" | "file" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown memory.backend '{other}' (expected 'memory' or 'file')"
                )));
            }
        }
        if self.memory.max_messages_per_session == 0 {
            return Err(ConfigError::Invalid(
                "memory.max_messages_per_session must be > 0".into(),
            ));
        }
        if self.memory.max_chars_per_message == 0 {
            return Err(ConfigError::Invalid(
                "memory.max_chars_per_message must be > 0".into(),
            ));
        }
        if self.runtime.max_steps == 0 {
            return Err(ConfigError::Invalid("runtime.max_steps must be > 0".into()));
        }
        if self.runtime.session_capacity == 0 {
            return Err(ConfigError::Invalid(
                "runtime.session_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}
