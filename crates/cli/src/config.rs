//! aoap-switch configuration management

use anyhow::{Context, Result, anyhow};
use coordinator::TransitionTiming;
use protocol::{AoapSwitchRequest, DeviceInfo};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    /// Reset-and-confirm poll bounds
    #[serde(default)]
    pub timing: TransitionTiming,
    /// Default identification strings for `start`
    #[serde(default)]
    pub accessory: AccessorySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "GeneralSettings::default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl GeneralSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// Identification strings sent during the accessory handshake
///
/// # Example Configuration
/// ```toml
/// [accessory]
/// manufacturer = "Acme"
/// model = "Head Unit"
/// description = "In-car infotainment"
/// version = "2.1"
/// uri = "https://example.com/headunit"
/// serial = "HU-0001"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessorySettings {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
    pub uri: String,
    pub serial: String,
}

impl Default for AccessorySettings {
    fn default() -> Self {
        Self {
            manufacturer: "aoap-switch".to_string(),
            model: "aoap-switch".to_string(),
            description: "USB accessory host".to_string(),
            version: "1.0".to_string(),
            uri: String::new(),
            serial: String::new(),
        }
    }
}

/// Per-invocation replacements for configured identification strings
#[derive(Debug, Clone, Default)]
pub struct AccessoryOverrides {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub uri: Option<String>,
    pub serial: Option<String>,
}

impl AccessorySettings {
    /// Build a handshake request for `device`, preferring `overrides`
    pub fn request_for(&self, device: DeviceInfo, overrides: AccessoryOverrides) -> AoapSwitchRequest {
        let pick = |value: Option<String>, default: &String| value.unwrap_or_else(|| default.clone());

        AoapSwitchRequest::new(
            device,
            pick(overrides.manufacturer, &self.manufacturer),
            pick(overrides.model, &self.model),
        )
        .with_description(pick(overrides.description, &self.description))
        .with_version(pick(overrides.version, &self.version))
        .with_uri(pick(overrides.uri, &self.uri))
        .with_serial(pick(overrides.serial, &self.serial))
    }
}

impl AppConfig {
    /// Load configuration from the specified path, or the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand_path(&p),
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(anyhow!("No configuration file found, using defaults"));
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_path(path);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("aoap-switch").join("config.toml")
        } else {
            PathBuf::from(".config/aoap-switch/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        self.timing
            .validate()
            .map_err(|e| anyhow!("Invalid [timing] section: {}", e))?;

        Ok(())
    }
}

/// Expand a leading `~` in a user-supplied path
fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
