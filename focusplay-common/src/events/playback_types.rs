//! Playback-related type definitions
//!
//! Supporting types for player lifecycle and audio focus arbitration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a player instance
///
/// Used as the key in the focus registry and stamped on every event the
/// player emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Allocate a fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PlayerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player transport state
///
/// Exactly one state is current at any time. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Created, nothing loaded
    Idle,
    /// Source load in flight
    Loading,
    /// Source loaded, transport stopped
    Prepared,
    /// Transport running
    Playing,
    /// Transport paused
    Paused,
    /// Terminal; every further operation is rejected
    Disposed,
}

impl PlayerState {
    /// True for states in which a source handle is held
    pub fn has_source(&self) -> bool {
        matches!(self, PlayerState::Prepared | PlayerState::Playing | PlayerState::Paused)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Prepared => write!(f, "prepared"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Disposed => write!(f, "disposed"),
        }
    }
}

/// Platform focus change notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusChangeKind {
    /// Focus restored after a loss
    Gain,
    /// Short loss (notification sound); pause and expect a gain
    TransientLoss,
    /// Loss with no expectation of return
    Loss,
    /// Another app needs the output but ducking is permitted
    LossCanDuck,
}

impl std::fmt::Display for FocusChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusChangeKind::Gain => write!(f, "gain"),
            FocusChangeKind::TransientLoss => write!(f, "transient_loss"),
            FocusChangeKind::Loss => write!(f, "loss"),
            FocusChangeKind::LossCanDuck => write!(f, "loss_can_duck"),
        }
    }
}

/// How the OS-level focus session should be requested
///
/// Passed through to the platform unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationHint {
    /// Long-lived focus (music playback)
    #[default]
    Gain,
    /// Short focus; others should pause
    Transient,
    /// Short focus; others may keep playing at reduced volume
    TransientMayDuck,
}

impl std::fmt::Display for DurationHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationHint::Gain => write!(f, "gain"),
            DurationHint::Transient => write!(f, "transient"),
            DurationHint::TransientMayDuck => write!(f, "transient_may_duck"),
        }
    }
}
