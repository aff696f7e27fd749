//! Configuration file loading.
//!
//! Files are read as TOML or JSON, chosen by extension, into a raw
//! [`serde_json::Value`] which is then handed to the [`ConfigValidator`].

use super::schema::AppConfig;
use super::validator::ConfigValidator;
use crate::core::constants::CONFIG_SEARCH_PATHS;
use crate::core::errors::{PipelineError, PipelineResult};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the configuration file to use.
    ///
    /// An explicit path must exist. Without one, the [`CONFIG_SEARCH_PATHS`]
    /// are probed relative to the working directory and the first existing
    /// file wins.
    pub fn discover(explicit: Option<&Path>) -> PipelineResult<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(PipelineError::config_error(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        CONFIG_SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .ok_or_else(|| {
                PipelineError::config_error(format!(
                    "no config file found (searched {})",
                    CONFIG_SEARCH_PATHS.join(", ")
                ))
            })
    }

    /// Load and validate configuration from a file, auto-detecting the format
    /// from the extension
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// A Result containing the validated AppConfig or a PipelineError
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use plantroute::core::config::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load_from_file(Path::new("config.toml"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_file(path: &Path) -> PipelineResult<AppConfig> {
        let raw = Self::load_raw_from_file(path)?;
        ConfigValidator::validate(&raw)
    }

    /// Reads a file into an unvalidated mapping.
    pub fn load_raw_from_file(path: &Path) -> PipelineResult<Value> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| {
            PipelineError::config_error(format!(
                "unsupported config file extension: {:?}",
                path.extension()
            ))
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config_error(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        Self::parse(&content, format)
    }

    /// Load and validate configuration from a string with specified format
    pub fn load_from_string(content: &str, format: ConfigFormat) -> PipelineResult<AppConfig> {
        let raw = Self::parse(content, format)?;
        ConfigValidator::validate(&raw)
    }

    fn parse(content: &str, format: ConfigFormat) -> PipelineResult<Value> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
                PipelineError::config_error(format!("failed to parse TOML config: {e}"))
            }),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
                PipelineError::config_error(format!("failed to parse JSON config: {e}"))
            }),
        }
    }
}
