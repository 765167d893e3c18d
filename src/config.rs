//! Configuration for filter-studio.
//!
//! The config file is optional; without one the editor uses the built-in
//! filter catalog and stores its gallery in the platform data directory.
//!
//! # Config file locations
//!
//! Priority order:
//! 1. `$FILTER_STUDIO_CONFIG` environment variable
//! 2. `<config dir>/filter-studio/config.toml` (e.g. `~/.config/filter-studio/config.toml`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::state::data::ListOrder;
use crate::transform::catalog::{default_catalog, Filter};
use crate::transform::pipeline::DEFAULT_TIMEOUT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    pub gallery: GalleryConfig,
    pub transform: TransformConfig,
    pub download: DownloadConfig,
    /// Filter buttons, in display order
    pub filters: Vec<Filter>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gallery: GalleryConfig::default(),
            transform: TransformConfig::default(),
            download: DownloadConfig::default(),
            filters: default_catalog(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if no config file exists.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "No config file found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the config file path based on environment and platform.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FILTER_STUDIO_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("filter-studio").join("config.toml"))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transform.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transform.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.filters.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[filters]] entry is required".to_string(),
            ));
        }

        for filter in &self.filters {
            filter
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.download.default_filename.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "download.default_filename must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where the gallery lives and how it is listed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GalleryConfig {
    /// Database file; the platform data directory when unset
    pub database_path: Option<PathBuf>,
    pub default_order: ListOrder,
}

/// Limits on the transform engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TransformConfig {
    /// Longest a single filter may run before it is reported as failed
    pub timeout_secs: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl TransformConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Suggested file names for the save-as dialog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct DownloadConfig {
    /// Used when downloading the working image
    pub default_filename: String,
    /// Used for gallery images whose name is empty
    pub gallery_filename: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_filename: "processed_image.png".to_string(),
            gallery_filename: "downloaded-image.png".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.transform.timeout(), Duration::from_secs(30));
        assert_eq!(config.filters, default_catalog());
        assert_eq!(config.gallery.default_order, ListOrder::DateDesc);
        assert!(config.gallery.database_path.is_none());
        assert_eq!(config.download.default_filename, "processed_image.png");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.transform.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.transform.timeout_secs = 5;
        assert!(config.validate().is_ok());

        config.filters.clear();
        assert!(config.validate().is_err());

        config.filters = vec![Filter::Resize { width: 0, height: 10 }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_string() {
        let toml = r#"
[gallery]
database_path = "/tmp/gallery.db"
default_order = "name"

[transform]
timeout_secs = 10

[[filters]]
name = "blur"
sigma = 2.5

[[filters]]
name = "grayscale"
"#;

        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(
            config.gallery.database_path.as_deref(),
            Some(Path::new("/tmp/gallery.db"))
        );
        assert_eq!(config.gallery.default_order, ListOrder::Name);
        assert_eq!(config.transform.timeout_secs, 10);
        assert_eq!(
            config.filters,
            vec![Filter::Blur { sigma: 2.5 }, Filter::Grayscale]
        );
        // Untouched sections keep their defaults
        assert_eq!(config.download.gallery_filename, "downloaded-image.png");
    }

    #[test]
    fn test_deny_unknown_fields() {
        let toml = r#"
[transform]
timeout_secs = 10
retries = 3
"#;

        assert!(AppConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.filters.len(), 3);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[filters]]\nname = \"blur\"\nsigma = -1.0\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
