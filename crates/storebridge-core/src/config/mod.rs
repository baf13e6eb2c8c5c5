//! Configuration management for Storebridge.
//!
//! This module handles loading, saving, and validating the owner and client
//! configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/storebridge/config.toml` |
//! | macOS | `~/Library/Application Support/dev.Storebridge.Storebridge/config.toml` |
//! | Windows | `%APPDATA%\Storebridge\Storebridge\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use storebridge_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Owner address: {}", config.ipc.address);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::{self, StateTree};

/// Main configuration struct for Storebridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport settings
    pub ipc: IpcConfig,
    /// Bridge settings
    pub bridge: BridgeConfig,
    /// Store settings
    pub store: StoreConfig,
}

/// Transport configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Address the owner listens on and remote windows connect to
    pub address: String,
    /// Timeout for connecting, the ready handshake and each outbound write
    #[serde(with = "humantime_serde")]
    pub io_timeout: Duration,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", crate::DEFAULT_IPC_PORT),
            io_timeout: Duration::from_secs(crate::DEFAULT_IO_TIMEOUT_SECS),
        }
    }
}

/// Bridge configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Events the run queue holds before senders wait
    pub run_queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            run_queue_capacity: crate::DEFAULT_RUN_QUEUE_CAPACITY,
        }
    }
}

/// Store configuration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the initial state object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<PathBuf>,
}

impl StoreConfig {
    /// Load the configured initial state, or an empty tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object.
    pub fn load_initial_state(&self) -> Result<StateTree> {
        match &self.initial_state {
            Some(path) => load_state_file(path),
            None => Ok(StateTree::new()),
        }
    }
}

/// Read a JSON object from `path` as a state tree.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON object.
pub fn load_state_file(path: &Path) -> Result<StateTree> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidState(format!("failed to read {}: {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| Error::InvalidState(format!("{}: {e}", path.display())))?;

    state::into_tree(value).ok_or_else(|| {
        Error::InvalidState(format!("{}: top level must be an object", path.display()))
    })
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Check values that would make the owner unusable.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.ipc.address.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: "ipc.address".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.ipc.io_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                key: "ipc.io_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.bridge.run_queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                key: "bridge.run_queue_capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "Storebridge", "Storebridge")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let parse = |digits: &str, scale: u64| -> Result<u64, D::Error> {
            digits
                .trim()
                .parse::<u64>()
                .map(|n| n * scale)
                .map_err(serde::de::Error::custom)
        };

        if let Some(ms) = s.strip_suffix("ms") {
            parse(ms, 1).map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            parse(secs, 1).map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            parse(mins, 60).map(Duration::from_secs)
        } else {
            Err(serde::de::Error::custom("invalid duration format"))
        }
    }
}
