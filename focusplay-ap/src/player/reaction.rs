//! Reaction to routed focus changes
//!
//! | change          | reaction                                               |
//! |-----------------|--------------------------------------------------------|
//! | `Gain`          | restore a ducked volume; resume if a loss paused us    |
//! | `TransientLoss` | pause if playing, remember to resume                   |
//! | `Loss`          | as `TransientLoss`, then give up the focus claim       |
//! | `LossCanDuck`   | lower volume to the duck level, remembering the old one|

use async_trait::async_trait;
use focusplay_common::{FocusChangeKind, PlayerEvent, PlayerState};
use tracing::{debug, info, warn};

use super::state::PlayerCore;
use super::PlayerShared;
use crate::error::PlaybackError;
use crate::focus::FocusListener;

#[async_trait]
impl FocusListener for PlayerShared {
    async fn on_focus_change(&self, kind: FocusChangeKind) {
        let mut core = self.core.lock().await;
        if core.state == PlayerState::Disposed || !core.holds_focus {
            debug!(player_id = %self.id, %kind, "Ignoring focus change");
            return;
        }

        self.events.emit_lossy(PlayerEvent::focus_change(self.id, kind));
        match kind {
            FocusChangeKind::Gain => {
                self.unduck(&mut core);
                if core.resume_on_gain {
                    core.resume_on_gain = false;
                    self.resume(&mut core);
                }
            }
            FocusChangeKind::TransientLoss => {
                self.suspend(&mut core);
            }
            FocusChangeKind::Loss => {
                self.suspend(&mut core);
                self.release_focus(&mut core).await;
                info!(player_id = %self.id, "Focus lost");
            }
            FocusChangeKind::LossCanDuck => {
                self.duck(&mut core);
            }
        }
    }
}

impl PlayerShared {
    /// Pause an active playback, flagging it for resume on regain
    fn suspend(&self, core: &mut PlayerCore) {
        core.resume_on_gain = core.state == PlayerState::Playing;
        if !core.resume_on_gain {
            return;
        }
        if let Some(track) = &core.track {
            track.pause();
        }
        core.state = PlayerState::Paused;
        self.events.emit_lossy(PlayerEvent::paused(self.id));
        debug!(player_id = %self.id, "Paused for focus loss");
    }

    fn resume(&self, core: &mut PlayerCore) {
        if core.state != PlayerState::Paused {
            return;
        }
        let started = core
            .track()
            .and_then(|track| track.start().map_err(PlaybackError::from));
        match started {
            Ok(()) => {
                core.state = PlayerState::Playing;
                self.events.emit_lossy(PlayerEvent::started(self.id));
                debug!(player_id = %self.id, "Resumed on focus gain");
            }
            Err(err) => {
                warn!(player_id = %self.id, error = %err, "Resume on focus gain failed");
                self.events.emit_lossy(PlayerEvent::error(self.id, err.reason()));
            }
        }
    }

    fn duck(&self, core: &mut PlayerCore) {
        // Repeated duck requests keep the first saved volume
        if core.ducked_from.is_some() {
            return;
        }
        let (ducked, saved) = self.settings.volume_policy.duck(core.volume);
        core.ducked_from = Some(saved);
        core.volume = ducked;
        if let Some(track) = &core.track {
            track.set_volume(ducked);
        }
        debug!(player_id = %self.id, saved, ducked, "Ducked");
    }

    pub(super) fn unduck(&self, core: &mut PlayerCore) {
        let Some(saved) = core.ducked_from.take() else {
            return;
        };
        let restored = self.settings.volume_policy.restore(saved);
        core.volume = restored;
        if let Some(track) = &core.track {
            track.set_volume(restored);
        }
        debug!(player_id = %self.id, restored, "Duck released");
    }
}
