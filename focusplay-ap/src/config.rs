//! focusplay-ap runtime settings
//!
//! Validated views over the TOML configuration. The TOML layer supplies
//! defaults for every field; this layer rejects out-of-range values.

use std::time::Duration;

use focusplay_common::config::{validate_unit_range, TomlConfig};
use focusplay_common::DurationHint;

use crate::volume::VolumePolicy;

/// Focus arbitration settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusSettings {
    pub duck_level: f32,
    pub duration_hint: DurationHint,
}

impl FocusSettings {
    pub fn volume_policy(&self) -> VolumePolicy {
        VolumePolicy::new(self.duck_level)
    }
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            duck_level: crate::volume::DEFAULT_DUCK_LEVEL,
            duration_hint: DurationHint::Gain,
        }
    }
}

/// Per-player settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub event_capacity: usize,
    pub context_retry_attempts: u32,
    pub context_retry_interval: Duration,
    pub default_volume: f32,
    pub volume_policy: VolumePolicy,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            event_capacity: 100,
            context_retry_attempts: 20,
            context_retry_interval: Duration::from_millis(50),
            default_volume: 1.0,
            volume_policy: VolumePolicy::default(),
        }
    }
}

/// Settings for the whole player process
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Settings {
    pub focus: FocusSettings,
    pub player: PlayerSettings,
}

impl Settings {
    /// Validate a TOML configuration
    pub fn from_toml(config: &TomlConfig) -> focusplay_common::Result<Self> {
        let duck_level = validate_unit_range("focus.duck_level", config.focus.duck_level)?;
        let default_volume = validate_unit_range("player.default_volume", config.player.default_volume)?;
        if config.player.event_capacity == 0 {
            return Err(focusplay_common::Error::Config(
                "player.event_capacity must be at least 1".to_string(),
            ));
        }

        let focus = FocusSettings {
            duck_level,
            duration_hint: config.focus.duration_hint,
        };
        let player = PlayerSettings {
            event_capacity: config.player.event_capacity,
            context_retry_attempts: config.player.context_retry_attempts,
            context_retry_interval: Duration::from_millis(config.player.context_retry_interval_ms),
            default_volume,
            volume_policy: focus.volume_policy(),
        };
        Ok(Self { focus, player })
    }
}
