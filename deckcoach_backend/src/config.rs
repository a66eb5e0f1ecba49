use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Wire dialect spoken by the configured chat-completions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// `{url}/chat/completions` with a bearer token.
    #[default]
    Openai,
    /// `{url}/openai/deployments/{model}/chat/completions?api-version=..` with an `api-key` header.
    Azure,
}

impl ApiFlavor {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(ApiFlavor::Openai),
            "azure" => Some(ApiFlavor::Azure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    // Generation collaborator (OpenAI-compatible or Azure OpenAI)
    #[serde(default)]
    pub llm_api_url: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_model", alias = "deployment_name")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_flavor: ApiFlavor,
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // Extracted slide content cache
    #[serde(default = "default_content_cache_path")]
    pub content_cache_path: String,
    #[serde(default = "default_content_cache_version")]
    pub content_cache_version: String,
    #[serde(default = "default_content_cache_ttl_days")]
    pub content_cache_ttl_days: i64,

    // Extraction batching
    #[serde(default = "default_extraction_batch_size")]
    pub extraction_batch_size: usize,
    #[serde(default = "default_extraction_batch_delay_ms")]
    pub extraction_batch_delay_ms: u64,

    // Coaching behaviour
    #[serde(default = "default_thinking_delay_ms")]
    pub thinking_delay_ms: u64,
    #[serde(default = "default_contextual_challenge_probability")]
    pub contextual_challenge_probability: f64,
    #[serde(default = "default_throttle_window")]
    pub throttle_window: usize,
    #[serde(default = "default_throttle_threshold")]
    pub throttle_threshold: usize,
    #[serde(default = "default_throttle_escape_probability")]
    pub throttle_escape_probability: f64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default)]
    pub random_seed: Option<u64>,

    // Slide catalog (built-in sample deck when unset)
    #[serde(default)]
    pub catalog_path: Option<String>,
}

fn default_llm_model() -> String {
    "gpt-4".to_string()
}

fn default_azure_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_content_cache_path() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("deckcoach").join("slide_content.db"))
        .unwrap_or_else(|| PathBuf::from("deckcoach_slide_content.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_content_cache_version() -> String {
    "v1".to_string()
}

fn default_content_cache_ttl_days() -> i64 {
    7
}

fn default_extraction_batch_size() -> usize {
    3
}

fn default_extraction_batch_delay_ms() -> u64 {
    500
}

fn default_thinking_delay_ms() -> u64 {
    1500
}

fn default_contextual_challenge_probability() -> f64 {
    0.6
}

fn default_throttle_window() -> usize {
    6
}

fn default_throttle_threshold() -> usize {
    4
}

fn default_throttle_escape_probability() -> f64 {
    0.4
}

fn default_history_window() -> usize {
    6
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            llm_api_url: String::new(),
            llm_api_key: None,
            llm_model: default_llm_model(),
            llm_api_flavor: ApiFlavor::default(),
            azure_api_version: default_azure_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            content_cache_path: default_content_cache_path(),
            content_cache_version: default_content_cache_version(),
            content_cache_ttl_days: default_content_cache_ttl_days(),
            extraction_batch_size: default_extraction_batch_size(),
            extraction_batch_delay_ms: default_extraction_batch_delay_ms(),
            thinking_delay_ms: default_thinking_delay_ms(),
            contextual_challenge_probability: default_contextual_challenge_probability(),
            throttle_window: default_throttle_window(),
            throttle_threshold: default_throttle_threshold(),
            throttle_escape_probability: default_throttle_escape_probability(),
            history_window: default_history_window(),
            random_seed: None,
            catalog_path: None,
        }
    }
}

impl CoachConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Path of the config file: `DECKCOACH_CONFIG` if set, else next to the executable.
    pub fn config_path() -> PathBuf {
        match env::var("DECKCOACH_CONFIG") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => Self::get_base_dir().join("deckcoach_config.toml"),
        }
    }

    /// Load config from disk, then apply environment overrides.
    pub fn load() -> Self {
        let path = Self::config_path();

        let base = match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::warn!("No config file at {:?}, using defaults + env vars", path);
                Self::default()
            }
        };

        base.with_env_overrides()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str::<CoachConfig>(contents).context("Failed to parse coach config")
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Apply environment variable overrides on top of file/default values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("LLM_API_URL") {
            self.llm_api_url = url;
        }

        if let Ok(key) = env::var("LLM_API_KEY") {
            self.llm_api_key = Some(key);
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm_model = model;
        }

        if let Ok(flavor) = env::var("LLM_API_FLAVOR") {
            match ApiFlavor::parse(&flavor) {
                Some(flavor) => self.llm_api_flavor = flavor,
                None => tracing::warn!("Ignoring unknown LLM_API_FLAVOR '{}'", flavor),
            }
        }

        if let Ok(seed) = env::var("DECKCOACH_SEED") {
            if let Ok(seed) = seed.parse() {
                self.random_seed = Some(seed);
            }
        }

        if let Ok(delay) = env::var("DECKCOACH_THINKING_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.thinking_delay_ms = ms;
            }
        }

        if let Ok(path) = env::var("DECKCOACH_CACHE_PATH") {
            if !path.trim().is_empty() {
                self.content_cache_path = path;
            }
        }

        self
    }

    /// True when both endpoint and key are present.
    pub fn is_llm_configured(&self) -> bool {
        !self.llm_api_url.trim().is_empty()
            && self
                .llm_api_key
                .as_deref()
                .map(|key| !key.trim().is_empty())
                .unwrap_or(false)
            && !self.llm_model.trim().is_empty()
    }
}
