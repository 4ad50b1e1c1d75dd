//! Configuration management for taskloop
//!
//! Run toggles, generation parameters and semantic-context settings,
//! loaded from `.taskloop/config.toml` with defaults for anything missing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Result, TaskloopError};

/// Directory holding taskloop config and logs, relative to the root
pub const CONFIG_DIR: &str = ".taskloop";

/// Repository-level taskloop configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskloopConfig {
    /// Loop topology and pacing
    #[serde(default)]
    pub run: RunConfig,

    /// Generation gateway parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Semantic context retrieval
    #[serde(default)]
    pub semantic: SemanticConfig,
}

/// Loop topology and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Add the StopCheck phase after Prioritize
    #[serde(default)]
    pub enable_stop_check: bool,

    /// Use vector retrieval for prompt context instead of the raw queue
    #[serde(default)]
    pub use_semantic_context: bool,

    /// Stop after this many full cycles (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<usize>,

    /// Pause between cycles
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,

    /// Append lifecycle events to `.taskloop/activity.md`
    #[serde(default = "default_true")]
    pub activity_log: bool,
}

/// Model tier requested from the generation gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Standard,
    Advanced,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Standard => write!(f, "standard"),
            ModelTier::Advanced => write!(f, "advanced"),
        }
    }
}

/// Generation gateway parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub model_tier: ModelTier,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    /// Concrete model behind the standard tier
    #[serde(default = "default_standard_model")]
    pub standard_model: String,

    /// Concrete model behind the advanced tier
    #[serde(default = "default_advanced_model")]
    pub advanced_model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
}

/// Semantic context retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Number of nearest results to pull into context
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Environment variable containing the embeddings API key
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
}

// Default value providers
fn default_true() -> bool {
    true
}

fn default_cycle_delay_ms() -> u64 {
    1000
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_output_tokens() -> usize {
    200
}

fn default_standard_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_advanced_model() -> String {
    "claude-opus-4-20250514".to_string()
}

fn default_generation_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl TaskloopConfig {
    /// Path of the config file under `root`
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join("config.toml")
    }

    /// Load configuration from `.taskloop/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = Self::path(root);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&content).map_err(|e| {
                TaskloopError::Config(format!("Failed to parse config file: {}", e))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.taskloop/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let config_path = Self::path(root);
        let content = toml::to_string_pretty(&Self::default()).map_err(|e| {
            TaskloopError::Config(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_output_tokens == 0 {
            return Err(TaskloopError::Config(
                "generation.max_output_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(TaskloopError::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.run.max_cycles == Some(0) {
            return Err(TaskloopError::Config(
                "run.max_cycles must be greater than 0 when set".to_string(),
            ));
        }
        if self.run.use_semantic_context && self.semantic.top_k == 0 {
            return Err(TaskloopError::Config(
                "semantic.top_k must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enable_stop_check: false,
            use_semantic_context: false,
            max_cycles: None,
            cycle_delay_ms: default_cycle_delay_ms(),
            activity_log: true,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_tier: ModelTier::default(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            standard_model: default_standard_model(),
            advanced_model: default_advanced_model(),
            api_key_env: default_generation_key_env(),
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            embedding_model: default_embedding_model(),
            api_key_env: default_embedding_key_env(),
            base_url: default_embedding_base_url(),
        }
    }
}
