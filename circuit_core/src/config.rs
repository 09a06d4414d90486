//! Configuration file support for Circuit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/circuit/config.toml`.

use crate::{DeviceProfile, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub heart_rate: HeartRateConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    /// JSONL file holding completed workouts
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.jsonl")
    }
}

/// Session timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Heart-rate zone configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartRateConfig {
    #[serde(default = "default_max_bpm")]
    pub max_bpm: u32,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            max_bpm: default_max_bpm(),
        }
    }
}

/// Which device the session runs on
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DeviceConfig {
    #[serde(default)]
    pub profile: DeviceProfile,
}

/// Premium status (stand-in for a store receipt check)
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SubscriptionConfig {
    #[serde(default)]
    pub premium: bool,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("circuit")
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_max_bpm() -> u32 {
    190
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session.tick_interval_ms == 0 {
            return Err(Error::Config("session.tick_interval_ms must be positive".into()));
        }
        if !(60..=250).contains(&self.heart_rate.max_bpm) {
            return Err(Error::Config(format!(
                "heart_rate.max_bpm {} is outside 60..=250",
                self.heart_rate.max_bpm
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("circuit").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.tick_interval_ms, 100);
        assert_eq!(config.heart_rate.max_bpm, 190);
        assert_eq!(config.device.profile, DeviceProfile::Phone);
        assert!(!config.subscription.premium);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[device]
profile = "watch"

[subscription]
premium = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.profile, DeviceProfile::Watch);
        assert!(config.subscription.premium);
        assert_eq!(config.session.tick_interval_ms, 100); // default
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.heart_rate.max_bpm = 182;
        config.session.tick_interval_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.heart_rate.max_bpm, 182);
        assert_eq!(loaded.session.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[session]\ntick_interval_ms = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
