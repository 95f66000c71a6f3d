use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BridgeError, Result};

/// TCP port the bridge listens on. Not configurable.
pub const BRIDGE_PORT: u16 = 80;

/// Top-level configuration for the bridge.
///
/// Loaded from `~/.vobridge/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist, cannot be parsed, or fails validation.
    ///
    /// The load error is handed back next to the defaults so it can be
    /// reported once logging is set up.
    pub fn load_or_default(path: &Path) -> (Self, Option<BridgeError>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Reject values that would make the poller spin or the adapters give up
    /// immediately.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("polling.interval_ms", self.polling.interval_ms),
            ("polling.failure_backoff_ms", self.polling.failure_backoff_ms),
            ("automation.timeout_ms", self.automation.timeout_ms),
            ("automation.status_interval_ms", self.automation.status_interval_ms),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(BridgeError::Config(format!("{} must be greater than 0", field)));
            }
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Phrase polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between narrator queries, in milliseconds.
    pub interval_ms: u64,
    /// Extra delay after a failed query, in milliseconds.
    pub failure_backoff_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            failure_backoff_ms: 2000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }
}

/// OS automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Upper bound for a single script invocation, in milliseconds.
    pub timeout_ms: u64,
    /// How often the narrator on/off state is sampled, in milliseconds.
    pub status_interval_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            status_interval_ms: 1000,
        }
    }
}

impl AutomationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}
