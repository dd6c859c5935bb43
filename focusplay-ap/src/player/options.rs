//! Load request options

use serde::{Deserialize, Serialize};

/// What to load and how to play it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// URI or path handed to the audio source
    pub source: String,
    /// Restart at the end instead of completing
    #[serde(default, rename = "loop")]
    pub loop_playback: bool,
    /// Start playing as soon as the load completes
    #[serde(default)]
    pub auto_play: bool,
    /// Play alongside other focus holders instead of requiring exclusivity
    #[serde(default)]
    pub mix_with_others: bool,
    #[serde(default)]
    pub pitch: Option<f32>,
    /// Initial volume; the configured default applies when absent
    #[serde(default)]
    pub volume: Option<f32>,
}

impl LoadRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            loop_playback: false,
            auto_play: false,
            mix_with_others: false,
            pitch: None,
            volume: None,
        }
    }

    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    pub fn with_auto_play(mut self, auto_play: bool) -> Self {
        self.auto_play = auto_play;
        self
    }

    pub fn with_mix_with_others(mut self, mix: bool) -> Self {
        self.mix_with_others = mix;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_option_object() {
        let request: LoadRequest = serde_json::from_str(
            r#"{"source": "track.mp3", "loop": true, "auto_play": true, "pitch": 1.2}"#,
        )
        .unwrap();
        assert_eq!(request.source, "track.mp3");
        assert!(request.loop_playback);
        assert!(request.auto_play);
        assert!(!request.mix_with_others);
        assert_eq!(request.pitch, Some(1.2));
        assert_eq!(request.volume, None);
    }

    #[test]
    fn test_builder() {
        let request = LoadRequest::new("a.ogg").with_mix_with_others(true).with_volume(0.5);
        assert!(request.mix_with_others);
        assert_eq!(request.volume, Some(0.5));
        assert!(!request.auto_play);
    }
}
