use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Seven days, the grace period before a soft-deleted tree is removed.
const DEFAULT_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// How long a soft-deleted tree stays recoverable.
    pub retention_window_secs: u64,
    pub sequencer: SequencerConfig,
    pub signing: SigningConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            retention_window_secs: DEFAULT_RETENTION_SECS,
            sequencer: SequencerConfig::default(),
            signing: SigningConfig::default(),
        }
    }
}

/// Background idle-root and reaping loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub enabled: bool,
    /// Time between passes.
    pub interval_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1_000,
        }
    }
}

impl SequencerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing attempts per root before the commit fails.
    pub max_attempts: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl ServiceConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> ServiceResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ServiceResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.sequencer.interval_ms == 0 {
            return Err(ServiceError::Config(
                "sequencer.interval_ms must be positive".into(),
            ));
        }
        if self.signing.max_attempts == 0 {
            return Err(ServiceError::Config(
                "signing.max_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }
}
