//! Configuration for the catalog engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (autodex.toml)
//! - Environment variables (AUTODEX__*)
//!
//! ## Example config file (autodex.toml):
//! ```toml
//! [store]
//! path = "autodex_data.json"
//! output_format = "pretty"
//!
//! [validation]
//! check_assets = true
//! image_extensions = ["jpg", "jpeg", "png"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutodexConfig {
    /// Durable catalog settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Record validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Durable catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the catalog file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How the catalog is written
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Check image paths and asset folders on disk
    #[serde(default = "default_true")]
    pub check_assets: bool,

    /// Extensions (without dot, case-insensitive) accepted as images
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("autodex_data.json")
}

fn default_true() -> bool {
    true
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff", "heic"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            output_format: OutputFormat::Pretty,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_assets: true,
            image_extensions: default_image_extensions(),
        }
    }
}

impl ValidationConfig {
    /// Whether `extension` is on the image allowlist
    pub fn is_image_extension(&self, extension: &str) -> bool {
        self.image_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

impl AutodexConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally layering a specific file on top
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["autodex.toml", ".autodex.toml", "config/autodex.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "autodex", "autodex") {
            let xdg_config = config_dir.config_dir().join("autodex.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("AUTODEX")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Catalog path, resolved against the working directory
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.store.path)
        }
    }
}
