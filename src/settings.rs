use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ConfigError;

/// Host-level settings shared by every account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Age after which a cached account entry is rebuilt even if its
    /// configuration is unchanged. Zero or negative disables time-based
    /// refresh.
    pub refresh_rate_seconds: i64,
    /// Bidder name to geoscope directives, used when an account asks for
    /// rules generated from bidder configuration.
    pub geoscopes: BTreeMap<String, Vec<String>>,
}

impl ModuleSettings {
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if `raw` is not a valid settings document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// The refresh interval, [`Duration::ZERO`] when time-based refresh is
    /// disabled.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        u64::try_from(self.refresh_rate_seconds).map_or(Duration::ZERO, Duration::from_secs)
    }
}
