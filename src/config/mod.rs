//! Configuration for the TokenTerminator client
//!
//! Supports configuration via:
//! 1. Config file (~/.config/token-terminator/config.toml)
//! 2. Environment variables (TOKEN_TERMINATOR_URL, etc.)
//! 3. Programmatic overrides through [`ConfigBuilder`]

use crate::align::AlignMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collaborator service connection
    pub service: ServiceSettings,

    /// Pipeline behavior
    pub pipeline: PipelineSettings,

    /// Presentation defaults
    pub display: DisplaySettings,
}

/// Collaborator service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Base URL of the optimize/analyze service
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Submissions before the one-shot ad trigger fires
    pub ad_threshold: u64,

    /// Factor for the "scaled to N prompts" savings display
    pub projection_factor: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ad_threshold: 3,
            projection_factor: 1_000_000,
        }
    }
}

/// Presentation defaults consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Default alignment mode for the removed-text view
    pub align_mode: AlignMode,

    /// Render answers through the markdown skin
    pub markdown_answers: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            align_mode: AlignMode::WordSet,
            markdown_answers: true,
        }
    }
}

impl Config {
    /// Get default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("token-terminator")
            .join("config.toml")
    }

    /// Load config from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from a specific path, falling back to defaults when the
    /// file does not exist. Environment overrides always apply.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("TOKEN_TERMINATOR_URL") {
            self.service.base_url = url;
        }
        if let Ok(timeout) = std::env::var("TOKEN_TERMINATOR_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.service.timeout_secs = secs;
            }
        }
        if let Ok(threshold) = std::env::var("TOKEN_TERMINATOR_AD_THRESHOLD") {
            if let Ok(value) = threshold.parse() {
                self.pipeline.ad_threshold = value;
            }
        }

        self
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "service.base_url must not be empty".to_string(),
            ));
        }
        if self.pipeline.projection_factor == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.projection_factor must be a positive integer".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate example config content.
    pub fn example() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.service.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.service.timeout_secs = secs;
        self
    }

    pub fn ad_threshold(mut self, threshold: u64) -> Self {
        self.config.pipeline.ad_threshold = threshold;
        self
    }

    pub fn projection_factor(mut self, factor: u64) -> Self {
        self.config.pipeline.projection_factor = factor;
        self
    }

    pub fn align_mode(mut self, mode: AlignMode) -> Self {
        self.config.display.align_mode = mode;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
