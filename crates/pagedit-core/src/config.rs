//! Editor configuration
//!
//! Loaded from TOML. Every section is optional and falls back to defaults:
//!
//! ```toml
//! [crop]
//! min_pixels = 10.0
//!
//! [materialize]
//! temp_dir = "/var/tmp/pagedit"
//! file_prefix = "pagedit_"
//! compress = true
//! ```

use crate::error::PageEditError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Crop selection limits
    #[serde(default)]
    pub crop: CropConfig,
    /// Where and how edited documents are written
    #[serde(default)]
    pub materialize: MaterializeConfig,
}

impl EditorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PageEditError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PageEditError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, PageEditError> {
        let config: Self = toml::from_str(s).map_err(|e| PageEditError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PageEditError> {
        if !(self.crop.min_pixels.is_finite() && self.crop.min_pixels >= 0.0) {
            return Err(PageEditError::Config(format!(
                "crop.min_pixels must be a non-negative number, got {}",
                self.crop.min_pixels
            )));
        }
        if self.materialize.file_prefix.contains(['/', '\\']) {
            return Err(PageEditError::Config(format!(
                "materialize.file_prefix must not contain path separators: '{}'",
                self.materialize.file_prefix
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    /// Smallest accepted selection, per axis, in thumbnail pixels (default: 10)
    #[serde(default = "default_min_pixels")]
    pub min_pixels: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            min_pixels: default_min_pixels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializeConfig {
    /// Directory for materialized documents (default: the system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// File name prefix for materialized documents (default: "pagedit_")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Compress streams when writing (default: true)
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            file_prefix: default_file_prefix(),
            compress: default_compress(),
        }
    }
}

impl MaterializeConfig {
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_min_pixels() -> f64 {
    10.0
}

fn default_file_prefix() -> String {
    "pagedit_".to_string()
}

fn default_compress() -> bool {
    true
}
