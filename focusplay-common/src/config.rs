//! Configuration loading and config file resolution
//!
//! Every field has a built-in default, so a missing config file is never fatal.
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/focusplay/config.toml`)
//! 4. Built-in defaults (fallback)

use crate::events::DurationHint;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FOCUSPLAY_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Focus arbitration configuration
    #[serde(default)]
    pub focus: FocusConfig,

    /// Per-player configuration
    #[serde(default)]
    pub player: PlayerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Focus arbitration configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FocusConfig {
    /// Volume applied while ducked (0.0-1.0)
    #[serde(default = "default_duck_level")]
    pub duck_level: f32,

    /// How the platform focus session is requested
    #[serde(default)]
    pub duration_hint: DurationHint,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            duck_level: default_duck_level(),
            duration_hint: DurationHint::default(),
        }
    }
}

/// Per-player configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlayerConfig {
    /// Broadcast capacity of each player's event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// How many times `load` polls for the platform context before failing
    #[serde(default = "default_context_retry_attempts")]
    pub context_retry_attempts: u32,

    /// Delay between platform context polls
    #[serde(default = "default_context_retry_interval_ms")]
    pub context_retry_interval_ms: u64,

    /// Volume used when a load request does not carry one (0.0-1.0)
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            context_retry_attempts: default_context_retry_attempts(),
            context_retry_interval_ms: default_context_retry_interval_ms(),
            default_volume: default_volume(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_duck_level() -> f32 {
    0.2
}

fn default_event_capacity() -> usize {
    100
}

fn default_context_retry_attempts() -> u32 {
    20
}

fn default_context_retry_interval_ms() -> u64 {
    50
}

fn default_volume() -> f32 {
    1.0
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration following the resolution priority
    ///
    /// An explicitly named file (CLI or environment) must exist. The platform
    /// default location is optional.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(ConfigSource::Explicit(path)) => Self::load_from(&path),
            Some(ConfigSource::Platform(path)) => {
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!("No config file at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
            None => {
                debug!("No config directory for this platform, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Where a config file path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Command-line argument or environment variable
    Explicit(PathBuf),
    /// Platform default location (may not exist)
    Platform(PathBuf),
}

/// Resolve the config file path following the priority order
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<ConfigSource> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(ConfigSource::Explicit(path.to_path_buf()));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(ConfigSource::Explicit(PathBuf::from(path)));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir().map(|d| ConfigSource::Platform(d.join("focusplay").join("config.toml")))
}

/// Reject a value outside 0.0-1.0
pub fn validate_unit_range(name: &str, value: f32) -> Result<f32> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::Config(format!("{} must be within 0.0-1.0, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.focus.duck_level, 0.2);
        assert_eq!(config.focus.duration_hint, DurationHint::Gain);
        assert_eq!(config.player.event_capacity, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section() {
        let config = TomlConfig::from_toml_str(
            r#"
            [focus]
            duck_level = 0.35
            "#,
        )
        .unwrap();
        assert_eq!(config.focus.duck_level, 0.35);
        assert_eq!(config.focus.duration_hint, DurationHint::Gain);
        assert_eq!(config.player, PlayerConfig::default());
    }

    #[test]
    fn test_malformed_config_is_error() {
        let result = TomlConfig::from_toml_str("[focus\nduck_level = ");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_validate_unit_range() {
        assert_eq!(validate_unit_range("x", 0.0).unwrap(), 0.0);
        assert_eq!(validate_unit_range("x", 1.0).unwrap(), 1.0);
        assert!(validate_unit_range("x", 1.01).is_err());
        assert!(validate_unit_range("x", -0.1).is_err());
        assert!(validate_unit_range("x", f32::NAN).is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        let path = PathBuf::from("/tmp/explicit.toml");
        let source = resolve_config_path(Some(&path), "FOCUSPLAY_TEST_UNSET_VAR");
        assert_eq!(source, Some(ConfigSource::Explicit(path)));
    }
}
