//! Configuration loading and management
//!
//! Handles parsing of the optional `.tsk.toml` project file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::case_id::{DEFAULT_SEQ_WIDTH, DEFAULT_SLUG_MAX_LEN};
use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::storage::CONFIG_FILE;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Case identifier settings
    #[serde(default)]
    pub cases: CasesConfig,

    /// Project discovery settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Locking settings
    #[serde(default)]
    pub lock: LockConfig,
}

/// Identifier allocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasesConfig {
    /// Zero-padding width of the sequence part
    #[serde(default = "default_seq_width")]
    pub seq_width: usize,

    /// Maximum slug length in bytes
    #[serde(default = "default_slug_max_len")]
    pub slug_max_len: usize,
}

fn default_seq_width() -> usize {
    DEFAULT_SEQ_WIDTH
}

fn default_slug_max_len() -> usize {
    DEFAULT_SLUG_MAX_LEN
}

impl Default for CasesConfig {
    fn default() -> Self {
        Self {
            seq_width: default_seq_width(),
            slug_max_len: default_slug_max_len(),
        }
    }
}

/// Project discovery settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Default depth for `list` / `validate` (0 = project root only)
    #[serde(default)]
    pub level: usize,
}

/// Lock settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long a mutation waits for a case lock
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a file, strictly.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.tsk.toml` from a project root, or return defaults.
    pub fn load_from_root(project_root: &Path) -> Self {
        let config_path = project_root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %err,
                    "ignoring invalid configuration"
                );
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::lock::write_atomic_str(path, &content)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=9).contains(&self.cases.seq_width) {
            return Err(Error::InvalidConfig(
                "cases.seq_width must be between 1 and 9".to_string(),
            ));
        }
        if !(8..=128).contains(&self.cases.slug_max_len) {
            return Err(Error::InvalidConfig(
                "cases.slug_max_len must be between 8 and 128".to_string(),
            ));
        }
        if self.lock.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock.timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
