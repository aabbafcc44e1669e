// SPDX-License-Identifier: GPL-3.0-only

//! Engine configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! sector_alignment = 2048
//! copy_block_size = 10485760
//! commit_timeout_secs = 10
//! regenerate_uuid_on_copy = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storage_sys::DEFAULT_BLOCK_SIZE;
use storage_types::DEFAULT_SECTOR_ALIGNMENT;
use thiserror::Error;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "STORAGE_OPS_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sectors partitions are aligned to on disks and RAID devices
    pub sector_alignment: u64,

    /// Bytes moved per block by the copy engine
    pub copy_block_size: u64,

    /// Seconds the backend may take to commit a partition table
    pub commit_timeout_secs: u64,

    /// Give copied file systems a fresh UUID
    pub regenerate_uuid_on_copy: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sector_alignment: DEFAULT_SECTOR_ALIGNMENT,
            copy_block_size: DEFAULT_BLOCK_SIZE,
            commit_timeout_secs: 10,
            regenerate_uuid_on_copy: true,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The file named by `STORAGE_OPS_CONFIG`, or the defaults when it is unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sector_alignment == 0 {
            return Err(ConfigError::Invalid(
                "sector_alignment must be at least 1".to_string(),
            ));
        }
        if self.copy_block_size == 0 {
            return Err(ConfigError::Invalid(
                "copy_block_size must not be zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs)
    }
}
