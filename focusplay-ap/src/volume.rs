//! Ducking and restore arithmetic
//!
//! `VolumePolicy` is stateless apart from its attenuation level. The caller
//! keeps the saved volume returned by `duck` and hands it back to `restore`,
//! so a duck/restore round trip reproduces the original volume bit for bit.

/// Attenuation level used when no configuration overrides it
pub const DEFAULT_DUCK_LEVEL: f32 = 0.2;

/// Maps focus ducking events onto volume changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumePolicy {
    duck_level: f32,
}

impl VolumePolicy {
    /// Create a policy with the given attenuation level (clamped to 0.0-1.0)
    pub fn new(duck_level: f32) -> Self {
        let duck_level = if duck_level.is_finite() { duck_level.clamp(0.0, 1.0) } else { DEFAULT_DUCK_LEVEL };
        Self { duck_level }
    }

    pub fn duck_level(&self) -> f32 {
        self.duck_level
    }

    /// Volume to apply while ducked, and the volume to save for the restore
    ///
    /// A player already quieter than the attenuation level keeps its volume.
    pub fn duck(&self, current_volume: f32) -> (f32, f32) {
        let current = clamp_volume(current_volume);
        (current.min(self.duck_level), current)
    }

    /// Volume to apply when the duck episode ends
    pub fn restore(&self, saved_volume: f32) -> f32 {
        clamp_volume(saved_volume)
    }
}

impl Default for VolumePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DUCK_LEVEL)
    }
}

/// Clamp a caller-supplied volume to 0.0-1.0; NaN becomes silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
