use crate::extraction::gemini::{self, Sampling};
use crate::global;
use crate::transcription::poll_policy::PollPolicy;
use crate::transcription::providers::assembly_api;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const TRANSCRIPTION_KEY_ENV: &str = "ASSEMBLYAI_API_KEY";
pub const EXTRACTION_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{name} API key is not set. Set {env} or add api_key to the config file")]
    MissingApiKey {
        name: &'static str,
        env: &'static str,
    },

    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid config value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub transcription: TranscriptionConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted `/process-voice` request body.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub language: Option<String>,
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3737,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: Some(assembly_api::DEFAULT_ENDPOINT.to_string()),
            language: None,
            poll_interval_ms: 1000,
            max_poll_interval_ms: 8000,
            backoff_multiplier: 1.5,
            max_wait_secs: 300,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let sampling = Sampling::default();
        Self {
            api_key: None,
            api_endpoint: Some(gemini::DEFAULT_ENDPOINT.to_string()),
            model: gemini::DEFAULT_MODEL.to_string(),
            temperature: sampling.temperature,
            max_output_tokens: sampling.max_output_tokens,
        }
    }
}

fn present(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}

impl TranscriptionConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        present(&self.api_key).ok_or(ConfigError::MissingApiKey {
            name: "AssemblyAI",
            env: TRANSCRIPTION_KEY_ENV,
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
            multiplier: self.backoff_multiplier,
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

impl ExtractionConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        present(&self.api_key).ok_or(ConfigError::MissingApiKey {
            name: "Gemini",
            env: EXTRACTION_KEY_ENV,
        })
    }

    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

impl Config {
    /// Loads the config file (creating a default one when absent) and applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            config
        } else {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Read(e.to_string()))
                .with_context(|| format!("Config path: {}", config_path.display()))?;
            info!("Loaded config from {:?}", config_path);
            Self::from_toml_str(&content)?
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overrides API keys from the environment. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(TRANSCRIPTION_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.transcription.api_key = Some(key);
        }
        if let Some(key) = lookup(EXTRACTION_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.extraction.api_key = Some(key);
        }
    }

    /// Checks everything the HTTP service needs before it accepts requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transcription.require_api_key()?;
        self.extraction.require_api_key()?;

        if self.transcription.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "transcription.poll_interval_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.transcription.max_poll_interval_ms < self.transcription.poll_interval_ms {
            return Err(ConfigError::Invalid {
                key: "transcription.max_poll_interval_ms".to_string(),
                message: "must not be smaller than poll_interval_ms".to_string(),
            });
        }
        if self.transcription.max_wait_secs.saturating_mul(1000) < self.transcription.poll_interval_ms
        {
            return Err(ConfigError::Invalid {
                key: "transcription.max_wait_secs".to_string(),
                message: "must cover at least one poll_interval_ms".to_string(),
            });
        }
        if self.transcription.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                key: "transcription.backoff_multiplier".to_string(),
                message: "must be at least 1.0".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.extraction.temperature) {
            return Err(ConfigError::Invalid {
                key: "extraction.temperature".to_string(),
                message: "must be between 0.0 and 2.0".to_string(),
            });
        }
        if self.extraction.max_output_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "extraction.max_output_tokens".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
