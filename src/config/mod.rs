// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::assets::validate_model_name;

/// Configuration for model assets and local model storage
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Root of the packaged, read-only assets (models live under `models/`)
    pub assets_dir: PathBuf,
    /// Writable storage root; copied models land in `<storage_dir>/models`
    pub storage_dir: PathBuf,
    /// Model loaded by default when none is named explicitly
    pub default_model: String,
}

/// Configuration for the native inference engine
#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    /// Default upper bound on generated tokens
    pub max_tokens: u32,
    /// Size of the context window for each generation session
    pub context_size: u32,
    /// Batch size used while feeding the prompt
    pub batch_size: u32,
    /// Number of layers offloaded to the GPU
    pub n_gpu_layers: u32,
    /// Memory-map the model file instead of reading it
    pub use_mmap: bool,
    /// Lock the model in RAM
    pub use_mlock: bool,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Model asset and storage settings
    pub models: ModelConfig,
    /// Inference-related settings
    pub inference: InferenceConfig,
    /// Logging-related settings
    pub logging: LoggingConfig,
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Creates a new Settings instance from `./config`, loading sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with LLAMABRIDGE_, sections split
    ///    by `__` (e.g. `LLAMABRIDGE_INFERENCE__MAX_TOKENS`)
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");

        Self::from_dir(&config_dir)
    }

    /// Loads settings from an explicit config directory.
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        // Check if config directory exists
        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        // Check if default.toml exists
        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        let local_config = config_dir.join("local.toml");

        // Convert paths to strings and keep them alive
        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let settings = Config::builder()
            .add_source(File::with_name(&default_config_path))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(
                Environment::with_prefix("LLAMABRIDGE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        // Create storage directory if it doesn't exist
        if !self.models.storage_dir.exists() {
            std::fs::create_dir_all(&self.models.storage_dir).map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to create storage directory at {}: {}",
                    self.models.storage_dir.display(), e
                ))
            })?;
        }

        validate_model_name(&self.models.default_model).map_err(|e| {
            ConfigError::Message(format!("Invalid default_model: {}", e))
        })?;

        if self.inference.max_tokens == 0 {
            return Err(ConfigError::Message(
                "max_tokens must be greater than 0".to_string()
            ));
        }

        if self.inference.context_size == 0 {
            return Err(ConfigError::Message(
                "context_size must be greater than 0".to_string()
            ));
        }

        if self.inference.batch_size == 0 {
            return Err(ConfigError::Message(
                "batch_size must be greater than 0".to_string()
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        // Create log directory if configured and doesn't exist
        if let Some(log_dir) = &self.logging.file {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        log_dir.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }
}
