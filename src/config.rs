//! Configuration management for Workdesk
//!
//! Configuration is loaded from a YAML file with environment-variable
//! overrides for secrets (provider API keys and storage credentials are
//! never read from the file). Every section has serde defaults so a
//! partial file, or no file at all, yields a working configuration.

use crate::error::{Result, WorkdeskError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Tool-calling loop settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Object storage backend settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chat session repository settings
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Settings for all chat providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Anthropic Messages API
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// OpenAI chat completions
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Cerebras chat completions
    #[serde(default)]
    pub cerebras: CerebrasConfig,

    /// Local Ollama-compatible endpoint
    #[serde(default)]
    pub local: LocalProviderConfig,
}

/// Anthropic provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API base URL
    #[serde(default = "default_anthropic_api_base")]
    pub api_base: String,

    /// Default model when the request does not specify one
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Maximum completion tokens per round
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,

    /// Maximum uses of the server-side web search tool per turn
    #[serde(default = "default_web_search_max_uses")]
    pub web_search_max_uses: u32,

    /// API key, populated from `ANTHROPIC_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_anthropic_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    2048
}

fn default_web_search_max_uses() -> u32 {
    5
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_base: default_anthropic_api_base(),
            model: default_anthropic_model(),
            max_tokens: default_anthropic_max_tokens(),
            web_search_max_uses: default_web_search_max_uses(),
            api_key: None,
        }
    }
}

/// OpenAI provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (must include the version prefix, e.g. `/v1`)
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Default model when the request does not specify one
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API key, populated from `OPENAI_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-5".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            model: default_openai_model(),
            api_key: None,
        }
    }
}

/// Cerebras provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CerebrasConfig {
    /// API base URL
    #[serde(default = "default_cerebras_api_base")]
    pub api_base: String,

    /// Default model when the request does not specify one
    #[serde(default = "default_cerebras_model")]
    pub model: String,

    /// Default reasoning effort (low, medium, high)
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,

    /// API key, populated from `CEREBRAS_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_cerebras_api_base() -> String {
    "https://api.cerebras.ai/v1".to_string()
}

fn default_cerebras_model() -> String {
    "gpt-oss-120b".to_string()
}

fn default_reasoning_effort() -> String {
    "low".to_string()
}

impl Default for CerebrasConfig {
    fn default() -> Self {
        Self {
            api_base: default_cerebras_api_base(),
            model: default_cerebras_model(),
            reasoning_effort: default_reasoning_effort(),
            api_key: None,
        }
    }
}

/// Local Ollama-compatible provider settings
///
/// The local endpoint speaks the OpenAI chat-completions wire format and
/// requires no API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProviderConfig {
    /// Endpoint host, e.g. `http://localhost:11434`
    #[serde(default = "default_local_host")]
    pub host: String,

    /// Default model when the request does not specify one
    #[serde(default = "default_local_model")]
    pub model: String,

    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum completion tokens per round
    #[serde(default = "default_local_max_tokens")]
    pub max_completion_tokens: u32,
}

fn default_local_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_local_max_tokens() -> u32 {
    2048
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            host: default_local_host(),
            model: default_local_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_completion_tokens: default_local_max_tokens(),
        }
    }
}

/// Behavior when the tool-calling loop exhausts its round budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoundLimitBehavior {
    /// Return the generic fallback message (original behavior)
    #[default]
    Fallback,
    /// Surface a distinct round-limit error to the caller
    Error,
}

/// Tool-calling loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum tool-calling rounds per chat turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Maximum trailing history messages forwarded to the provider
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// What to do when the round budget is exhausted
    #[serde(default)]
    pub on_round_limit: RoundLimitBehavior,
}

fn default_max_rounds() -> usize {
    5
}

fn default_history_limit() -> usize {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            history_limit: default_history_limit(),
            on_round_limit: RoundLimitBehavior::default(),
        }
    }
}

/// Thumbnail transform applied by the storage service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Target width in pixels
    #[serde(default = "default_thumbnail_size")]
    pub width: u32,

    /// Target height in pixels
    #[serde(default = "default_thumbnail_size")]
    pub height: u32,
}

fn default_thumbnail_size() -> u32 {
    128
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: default_thumbnail_size(),
            height: default_thumbnail_size(),
        }
    }
}

/// Object storage backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend endpoint, e.g. `http://127.0.0.1:54321`
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,

    /// Bucket holding user files
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Lifetime of signed thumbnail/preview URLs in seconds
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_seconds: u64,

    /// Thumbnail transform parameters
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,

    /// Service key, populated from `STORAGE_SERVICE_KEY`
    #[serde(skip)]
    pub service_key: Option<String>,

    /// Anonymous/publishable key, populated from `STORAGE_ANON_KEY`
    #[serde(skip)]
    pub anon_key: Option<String>,
}

fn default_storage_endpoint() -> String {
    "http://127.0.0.1:54321".to_string()
}

fn default_bucket() -> String {
    "files".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_storage_endpoint(),
            bucket: default_bucket(),
            signed_url_ttl_seconds: default_signed_url_ttl(),
            thumbnail: ThumbnailConfig::default(),
            service_key: None,
            anon_key: None,
        }
    }
}

/// Chat session repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Repository backend: "sled" (durable) or "memory"
    #[serde(default = "default_sessions_backend")]
    pub backend: String,

    /// Database path for the sled backend; defaults to the user data dir
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Serialized-size cap per user, in bytes
    #[serde(default = "default_sessions_max_bytes")]
    pub max_bytes: usize,

    /// Maximum sessions retained per user
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum messages retained per session
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Sessions spared from size-cap eviction (most recently updated)
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_sessions_backend() -> String {
    "sled".to_string()
}

fn default_sessions_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_sessions() -> usize {
    10
}

fn default_max_messages() -> usize {
    50
}

fn default_keep_recent() -> usize {
    2
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_sessions_backend(),
            path: None,
            max_bytes: default_sessions_max_bytes(),
            max_sessions: default_max_sessions(),
            max_messages: default_max_messages(),
            keep_recent: default_keep_recent(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WorkdeskError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| WorkdeskError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Secrets are only ever read from the environment.
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.providers.anthropic.api_key = Some(key);
            }
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.providers.openai.api_key = Some(key);
            }
        }

        if let Ok(key) = std::env::var("CEREBRAS_API_KEY") {
            if !key.is_empty() {
                self.providers.cerebras.api_key = Some(key);
            }
        }

        if let Ok(key) = std::env::var("STORAGE_SERVICE_KEY") {
            if !key.is_empty() {
                self.storage.service_key = Some(key);
            }
        }

        if let Ok(key) = std::env::var("STORAGE_ANON_KEY") {
            if !key.is_empty() {
                self.storage.anon_key = Some(key);
            }
        }

        if let Ok(host) = std::env::var("WORKDESK_LOCAL_HOST") {
            self.providers.local.host = host;
        }

        if let Ok(max_uses) = std::env::var("WEB_SEARCH_MAX_USES") {
            if let Ok(value) = max_uses.parse() {
                self.providers.anthropic.web_search_max_uses = value;
            } else {
                tracing::warn!("Invalid WEB_SEARCH_MAX_USES: {}", max_uses);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let crate::cli::Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(WorkdeskError::Config("server.host cannot be empty".to_string()).into());
        }

        if self.chat.max_rounds == 0 {
            return Err(
                WorkdeskError::Config("chat.max_rounds must be greater than 0".to_string()).into(),
            );
        }

        if self.chat.max_rounds > 100 {
            return Err(WorkdeskError::Config(
                "chat.max_rounds must be less than or equal to 100".to_string(),
            )
            .into());
        }

        let valid_efforts = ["low", "medium", "high"];
        if !valid_efforts.contains(&self.providers.cerebras.reasoning_effort.as_str()) {
            return Err(WorkdeskError::Config(format!(
                "Invalid reasoning effort: {}. Must be one of: {}",
                self.providers.cerebras.reasoning_effort,
                valid_efforts.join(", ")
            ))
            .into());
        }

        for (name, base) in [
            ("providers.anthropic.api_base", &self.providers.anthropic.api_base),
            ("providers.openai.api_base", &self.providers.openai.api_base),
            ("providers.cerebras.api_base", &self.providers.cerebras.api_base),
            ("providers.local.host", &self.providers.local.host),
            ("storage.endpoint", &self.storage.endpoint),
        ] {
            url::Url::parse(base).map_err(|e| {
                WorkdeskError::Config(format!("Invalid URL for {}: {}", name, e))
            })?;
        }

        if self.storage.bucket.is_empty() {
            return Err(
                WorkdeskError::Config("storage.bucket cannot be empty".to_string()).into(),
            );
        }

        let valid_backends = ["sled", "memory"];
        if !valid_backends.contains(&self.sessions.backend.as_str()) {
            return Err(WorkdeskError::Config(format!(
                "Invalid sessions backend: {}. Must be one of: {}",
                self.sessions.backend,
                valid_backends.join(", ")
            ))
            .into());
        }

        if self.sessions.max_bytes == 0 {
            return Err(WorkdeskError::Config(
                "sessions.max_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.sessions.max_sessions == 0 {
            return Err(WorkdeskError::Config(
                "sessions.max_sessions must be greater than 0".to_string(),
            )
            .into());
        }

        if self.sessions.max_messages == 0 {
            return Err(WorkdeskError::Config(
                "sessions.max_messages must be greater than 0".to_string(),
            )
            .into());
        }

        if self.sessions.keep_recent == 0 {
            return Err(WorkdeskError::Config(
                "sessions.keep_recent must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 8787);
    }

    #[test]
    fn test_chat_defaults() {
        let chat = ChatConfig::default();
        assert_eq!(chat.max_rounds, 5);
        assert_eq!(chat.history_limit, 10);
        assert_eq!(chat.on_round_limit, RoundLimitBehavior::Fallback);
    }

    #[test]
    fn test_sessions_defaults_match_quota_policy() {
        let sessions = SessionsConfig::default();
        assert_eq!(sessions.max_bytes, 10 * 1024 * 1024);
        assert_eq!(sessions.max_sessions, 10);
        assert_eq!(sessions.max_messages, 50);
        assert_eq!(sessions.keep_recent, 2);
    }

    #[test]
    fn test_zero_max_rounds_fails_validation() {
        let config = Config {
            chat: ChatConfig {
                max_rounds: 0,
                ..ChatConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_reasoning_effort_fails_validation() {
        let mut config = Config::default();
        config.providers.cerebras.reasoning_effort = "extreme".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_url_fails_validation() {
        let mut config = Config::default();
        config.storage.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_sessions_backend_fails_validation() {
        let mut config = Config::default();
        config.sessions.backend = "postgres".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let yaml = r#"
server:
  port: 9000
chat:
  max_rounds: 3
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.chat.max_rounds, 3);
        assert_eq!(config.chat.history_limit, 10);
        assert_eq!(config.providers.anthropic.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_round_limit_behavior_parses_lowercase() {
        let yaml = "max_rounds: 5\non_round_limit: error\n";
        let chat: ChatConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(chat.on_round_limit, RoundLimitBehavior::Error);
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let mut config = Config::default();
        config.providers.anthropic.api_key = Some("sk-secret".to_string());
        config.storage.service_key = Some("service-secret".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("sk-secret"));
        assert!(!yaml.contains("service-secret"));
    }
}
