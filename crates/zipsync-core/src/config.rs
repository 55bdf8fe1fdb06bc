//! Sync configuration file
//!
//! ```toml
//! [sync]
//! overwrite = "if-destination-older"
//! orphan = "delete"
//!
//! [compression]
//! method = "zstd"
//! level = 3
//! ```
//!
//! Every field is optional and falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use zipsync_fs::ConfigStore;
use zipsync_store::Compression;

use crate::{Error, Result};
use crate::query::SyncOptions;

/// Engine settings loadable from `.toml` or `.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sync: SyncOptions,
    pub compression: Compression,
}

impl SyncConfig {
    /// Load from a file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = ConfigStore::new().load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(ConfigStore::new().save(path, self)?)
    }

    /// Parse TOML text directly.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::usage(format!("invalid sync config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject a compression level the encoder would refuse on every write.
    pub fn validate(&self) -> Result<()> {
        let compression = self.compression;
        if compression.is_supported() {
            return Ok(());
        }
        let message = match compression.level_range() {
            Some(range) => format!(
                "compression level {:?} for {:?} is outside {}..={}",
                compression.level,
                compression.method,
                range.start(),
                range.end()
            ),
            None => format!("{:?} compression takes no level", compression.method),
        };
        Err(Error::usage(message))
    }
}
