//! Daemon configuration, read from TOML.

use crate::model::LabelSet;
use crate::records::ImportPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// File looked up inside a workspace when no `--config` is given.
pub const WORKSPACE_CONFIG_FILE: &str = "classbookd.toml";

pub const DEFAULT_BATCH_LIMIT: usize = 490;
pub const MAX_PDF_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Operations per cascade batch. The store's own ceiling still applies.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: u64,

    /// Prefix for public blob URLs. Empty means `file://` URLs.
    #[serde(default)]
    pub public_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_pdf_bytes: default_max_pdf_bytes(),
            public_base_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttendanceConfig {
    #[serde(default)]
    pub labels: LabelSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    #[serde(default)]
    pub default_policy: ImportPolicy,
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_max_pdf_bytes() -> u64 {
    MAX_PDF_BYTES
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `<workspace>/classbookd.toml` if present, defaults otherwise.
    pub fn for_workspace(workspace: &Path) -> Result<Self, ConfigError> {
        let path = workspace.join(WORKSPACE_CONFIG_FILE);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=500).contains(&self.store.batch_limit) {
            return Err(ConfigError::Validation(format!(
                "store.batch_limit must be between 1 and 500, got {}",
                self.store.batch_limit
            )));
        }
        if self.uploads.max_pdf_bytes == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_pdf_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
