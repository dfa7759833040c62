//! Server configuration types
//!
//! Mirrors `config/default.toml`; every section falls back to its defaults
//! when absent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vaporvibe_session::{
    mask_sensitive, ImageGenerationSummary, LlmSummary, RuntimeSummary, SessionStoreConfig,
};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    /// App brief shown in exports; may be replaced by a history import
    #[serde(default)]
    pub brief: Option<String>,
}

impl AppConfig {
    /// Store parameters derived from the session section
    pub fn store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            ttl: Duration::from_secs(self.session.ttl_secs),
            capacity: self.session.capacity,
        }
    }

    /// Runtime block of the `history.json` export
    pub fn runtime_summary(&self) -> RuntimeSummary {
        RuntimeSummary {
            history_limit: self.history.limit,
            history_max_bytes: self.history.max_bytes,
            include_instruction_panel: self.history.include_instruction_panel,
            image_generation: ImageGenerationSummary {
                enabled: self.images.enabled,
                provider: self.images.provider.clone(),
                model_id: self.images.model_id.clone(),
            },
        }
    }

    /// Provider block of the `history.json` export, key masked
    pub fn llm_summary(&self) -> LlmSummary {
        LlmSummary {
            provider: self.llm.provider.clone(),
            model: self.llm.model.clone(),
            max_output_tokens: self.llm.max_output_tokens,
            reasoning_mode: self.llm.reasoning_mode.clone(),
            reasoning_tokens_enabled: self.llm.reasoning_tokens.map(|_| true),
            reasoning_tokens: self.llm.reasoning_tokens,
            api_key_mask: mask_sensitive(self.llm.api_key.as_deref()),
        }
    }
}

/// HTTP listener
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Session store bounds and cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity timeout in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    vaporvibe_session::DEFAULT_TTL.as_secs()
}

fn default_capacity() -> usize {
    vaporvibe_session::DEFAULT_CAPACITY
}

fn default_cookie_name() -> String {
    "sid".to_string()
}

/// Prompt-context budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    /// 0 = unbounded
    #[serde(default = "default_history_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_true")]
    pub include_instruction_panel: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
            max_bytes: default_history_max_bytes(),
            include_instruction_panel: true,
        }
    }
}

fn default_history_limit() -> usize {
    30
}

fn default_history_max_bytes() -> usize {
    200_000
}

fn default_true() -> bool {
    true
}

/// Store persistence across restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/session-snapshot.json")
}

/// Provider settings reported in exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u64,
    #[serde(default = "default_reasoning_mode")]
    pub reasoning_mode: String,
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
    /// Only ever exported masked
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            reasoning_mode: default_reasoning_mode(),
            reasoning_tokens: None,
            api_key: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-5".to_string()
}

fn default_max_output_tokens() -> u64 {
    128_000
}

fn default_reasoning_mode() -> String {
    "none".to_string()
}

/// Image generation settings reported in exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_image_model")]
    pub model_id: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model_id: default_image_model(),
        }
    }
}

fn default_image_model() -> String {
    vaporvibe_session::images::DEFAULT_IMAGE_MODEL.to_string()
}
