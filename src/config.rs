//! Configuration
//!
//! Layered settings for the store, generation and logging. Sources, lowest
//! precedence first: built-in defaults, the global file
//! (`~/.config/zclgen/config.toml`), the workspace `config/config.toml`,
//! `config/{ZCLGEN_ENV}.toml`, then `ZCLGEN_*` environment variables
//! (`ZCLGEN_STORAGE__STORE_PATH=...`).

use crate::error::ApiError;
use crate::generation::GenerationConfig;
use crate::logging::LoggingConfig;
use config::{Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use sources::global_file::global_config_path;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZclgenConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Per-user data directory for the store, falling back to a workspace-local
/// directory when the platform has none.
pub fn default_store_path() -> PathBuf {
    ProjectDirs::from("", "", "zclgen")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".zclgen/store"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_template_directory")]
    pub template_directory: PathBuf,

    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Defaults to `generation-options.json` in the template directory.
    #[serde(default)]
    pub options_file: Option<PathBuf>,
}

fn default_template_directory() -> PathBuf {
    PathBuf::from("templates")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            template_directory: default_template_directory(),
            output_directory: default_output_directory(),
            options_file: None,
        }
    }
}

impl GenerationSettings {
    /// Run configuration for the generation pipeline.
    pub fn to_generation_config(&self) -> GenerationConfig {
        let config = GenerationConfig::new(&self.template_directory, &self.output_directory);
        match &self.options_file {
            Some(file) => config.with_options_file(file),
            None => config,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Storage(String),
    Generation(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "storage: {}", msg),
            ValidationError::Generation(msg) => write!(f, "generation: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ZclgenConfig {
    /// Every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("store_path cannot be empty".to_string()));
        }
        if self.generation.template_directory.as_os_str().is_empty() {
            errors.push(ValidationError::Generation(
                "template_directory cannot be empty".to_string(),
            ));
        }
        if self.generation.output_directory.as_os_str().is_empty() {
            errors.push(ValidationError::Generation(
                "output_directory cannot be empty".to_string(),
            ));
        }
        if self.generation.options_file.as_ref().is_some_and(|f| f.as_os_str().is_empty()) {
            errors.push(ValidationError::Generation(
                "options_file cannot be empty when set".to_string(),
            ));
        }
        for problem in crate::logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(problem));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Default configuration as TOML, for `zclgen config init`.
    pub fn default_toml() -> Result<String, ApiError> {
        toml::to_string_pretty(&ZclgenConfig::default())
            .map_err(|e| ApiError::ConfigError(format!("Cannot encode default config: {}", e)))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the layered configuration for `workspace_root` and validate it.
    pub fn load(workspace_root: &Path) -> Result<ZclgenConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let config: ZclgenConfig = builder
            .add_source(
                Environment::with_prefix("ZCLGEN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Self::checked(config)
    }

    /// Load a single TOML file over the defaults.
    pub fn load_from_file(path: &Path) -> Result<ZclgenConfig, ApiError> {
        let config: ZclgenConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Self::checked(config)
    }

    fn checked(config: ZclgenConfig) -> Result<ZclgenConfig, ApiError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(config)
    }
}
