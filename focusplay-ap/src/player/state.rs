//! Per-player mutable state
//!
//! Everything here is only touched under the player's operation lock, which
//! totally orders transitions on one instance.

use std::sync::Arc;

use focusplay_common::PlayerState;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use super::options::LoadRequest;
use crate::error::{PlaybackError, Result};
use crate::platform::Track;

pub(crate) struct PlayerCore {
    pub state: PlayerState,
    pub track: Option<Arc<dyn Track>>,
    pub options: Option<LoadRequest>,
    /// Volume currently applied to the track
    pub volume: f32,
    /// Pre-duck volume; `Some` only during a duck episode
    pub ducked_from: Option<f32>,
    /// Set when a focus loss auto-paused an active playback
    pub resume_on_gain: bool,
    pub speed: f32,
    /// Mirrors this player's membership in the arbitrator's holder set
    pub holds_focus: bool,
    /// Bumped by every load and by dispose; deferred work compares against it
    pub generation: u64,
    /// Cancels the fetch stage of an in-flight load
    pub pending_load: Option<CancellationToken>,
    /// Cancels the decoder stage of an in-flight seek
    pub pending_seek: Option<CancellationToken>,
    pub signal_watcher: Option<AbortHandle>,
}

impl PlayerCore {
    pub fn new(volume: f32) -> Self {
        Self {
            state: PlayerState::Idle,
            track: None,
            options: None,
            volume,
            ducked_from: None,
            resume_on_gain: false,
            speed: 1.0,
            holds_focus: false,
            generation: 0,
            pending_load: None,
            pending_seek: None,
            signal_watcher: None,
        }
    }

    pub fn ensure_not_disposed(&self, operation: &'static str) -> Result<()> {
        if self.state == PlayerState::Disposed {
            return Err(PlaybackError::InvalidState { operation, state: self.state });
        }
        Ok(())
    }

    /// Accept Prepared, Playing and Paused
    pub fn ensure_prepared(&self, operation: &'static str) -> Result<()> {
        match self.state {
            PlayerState::Prepared | PlayerState::Playing | PlayerState::Paused => Ok(()),
            PlayerState::Idle | PlayerState::Loading => {
                Err(PlaybackError::NotPrepared { operation, state: self.state })
            }
            PlayerState::Disposed => Err(PlaybackError::InvalidState { operation, state: self.state }),
        }
    }

    /// Loaded track; only valid after `ensure_prepared`
    pub fn track(&self) -> Result<Arc<dyn Track>> {
        self.track
            .clone()
            .ok_or_else(|| PlaybackError::Internal(format!("no source handle while {}", self.state)))
    }

    pub fn mix_with_others(&self) -> bool {
        self.options.as_ref().map(|o| o.mix_with_others).unwrap_or(false)
    }

    pub fn loop_playback(&self) -> bool {
        self.options.as_ref().map(|o| o.loop_playback).unwrap_or(false)
    }

    pub fn pitch(&self) -> Option<f32> {
        self.options.as_ref().and_then(|o| o.pitch)
    }

    /// Cancel every deferred task tied to the current generation
    pub fn abort_pending(&mut self) {
        for token in [self.pending_load.take(), self.pending_seek.take()].into_iter().flatten() {
            token.cancel();
        }
        if let Some(handle) = self.signal_watcher.take() {
            handle.abort();
        }
    }

    /// Stop and free the current track, if any
    pub fn release_track(&mut self) {
        if let Some(track) = self.track.take() {
            track.stop();
            track.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_in(state: PlayerState) -> PlayerCore {
        let mut core = PlayerCore::new(1.0);
        core.state = state;
        core
    }

    #[test]
    fn test_ensure_prepared() {
        assert!(core_in(PlayerState::Prepared).ensure_prepared("seek").is_ok());
        assert!(core_in(PlayerState::Playing).ensure_prepared("seek").is_ok());
        assert!(core_in(PlayerState::Paused).ensure_prepared("seek").is_ok());

        assert!(matches!(
            core_in(PlayerState::Idle).ensure_prepared("seek"),
            Err(PlaybackError::NotPrepared { .. })
        ));
        assert!(matches!(
            core_in(PlayerState::Loading).ensure_prepared("seek"),
            Err(PlaybackError::NotPrepared { .. })
        ));
        assert!(matches!(
            core_in(PlayerState::Disposed).ensure_prepared("seek"),
            Err(PlaybackError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_ensure_not_disposed() {
        assert!(core_in(PlayerState::Idle).ensure_not_disposed("set volume").is_ok());
        assert!(core_in(PlayerState::Disposed).ensure_not_disposed("set volume").is_err());
    }

    #[test]
    fn test_options_defaults_without_load() {
        let core = PlayerCore::new(0.5);
        assert!(!core.mix_with_others());
        assert!(!core.loop_playback());
        assert_eq!(core.pitch(), None);
        assert!(core.track().is_err());
    }

    #[test]
    fn test_abort_pending_cancels_deferred_work() {
        let mut core = PlayerCore::new(1.0);
        let load = CancellationToken::new();
        let seek = CancellationToken::new();
        core.pending_load = Some(load.clone());
        core.pending_seek = Some(seek.clone());

        core.abort_pending();

        assert!(load.is_cancelled());
        assert!(seek.is_cancelled());
        assert!(core.pending_load.is_none());
        assert!(core.pending_seek.is_none());
    }
}
