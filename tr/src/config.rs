//! toolrelay configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main toolrelay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool source and execution settings
    pub runtime: RuntimeConfig,

    /// Model provider configuration
    pub llm: LlmConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Fails fast with clear messages on configuration errors: a missing
    /// tool source locator or a missing provider API key.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.source_locator.is_empty() && self.runtime.folder_path.is_none() {
            return Err(eyre::eyre!(
                "No tool source configured. Set runtime.source-locator or runtime.folder-path."
            ));
        }
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.toolrelay.yml` in the working directory, then
    /// the user config directory, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".toolrelay.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("toolrelay").join("toolrelay.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Tool source and execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Registry API key or tool folder path; disambiguated by prefix
    #[serde(rename = "source-locator")]
    pub source_locator: String,

    /// Remote registry base URL
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Explicit tool folder; always wins over a key-shaped locator
    #[serde(rename = "folder-path")]
    pub folder_path: Option<PathBuf>,

    /// Reload the catalog after this many executions; 0 disables
    #[serde(rename = "auto-refresh-count")]
    pub auto_refresh_count: u32,

    /// Trust the default executors instead of probing runtimes
    #[serde(rename = "skip-environment-check")]
    pub skip_environment_check: bool,

    /// Log at debug level in the CLI
    pub verbose: bool,

    /// Per-subprocess timeout in milliseconds
    #[serde(rename = "execution-timeout-ms")]
    pub execution_timeout_ms: u64,
}

impl RuntimeConfig {
    /// Locators with this prefix are remote registry API keys
    pub const API_KEY_PREFIX: &'static str = "tk-";
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source_locator: String::new(),
            api_url: "https://api.toolrelay.dev/v1".to_string(),
            folder_path: None,
            auto_refresh_count: 0,
            skip_environment_check: false,
            verbose: false,
            execution_timeout_ms: 120_000,
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Stop after this many model continuations within one invoke
    #[serde(rename = "max-turns")]
    pub max_turns: u32,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("environment variable {} not set", self.api_key_env))
    }

    /// Defaults for the OpenAI provider
    pub fn openai() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            ..Default::default()
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
            max_turns: 16,
        }
    }
}
