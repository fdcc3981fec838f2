//! On-disk defaults for supervisor construction.
//!
//! Programmatic construction never requires a config file; this loader exists
//! so orchestration scripts can pin site-wide defaults (shutdown wait, wrapper
//! helper name, environment overlay) in one `procpump.toml`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error type for config loading.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Site-wide supervisor defaults loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorDefaults {
    /// Seconds to wait at each shutdown escalation level.
    pub shutdown_wait_secs: u64,
    /// Process name of the display wrapper's own helper, excluded from
    /// signal target resolution.
    pub helper_process_name: String,
    /// Environment overlay applied to every supervised launch.
    pub env: BTreeMap<String, String>,
}

impl Default for SupervisorDefaults {
    fn default() -> Self {
        Self {
            shutdown_wait_secs: 5,
            helper_process_name: "Xvfb".to_string(),
            env: BTreeMap::new(),
        }
    }
}

impl SupervisorDefaults {
    /// Load defaults from a TOML file.
    ///
    /// A missing file yields the built-in defaults; any other read or parse
    /// failure is an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read(e)),
        };
        let defaults = toml::from_str(&contents)?;
        Ok(defaults)
    }

    /// The shutdown wait as a `Duration`.
    #[must_use]
    pub fn shutdown_wait(&self) -> Duration {
        Duration::from_secs(self.shutdown_wait_secs)
    }
}
