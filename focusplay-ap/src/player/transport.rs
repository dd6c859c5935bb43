//! Transport signal handling
//!
//! Each prepared source gets a watcher task that forwards end-of-stream and
//! playback failures into the player. The watcher holds the player weakly and
//! tags itself with the generation it was started for, so signals from a
//! replaced or disposed source are dropped.

use std::sync::Weak;

use focusplay_common::{PlayerEvent, PlayerState};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::state::PlayerCore;
use super::PlayerShared;
use crate::error::PlaybackError;
use crate::platform::TransportSignal;

pub(super) fn spawn_signal_watcher(
    player: Weak<PlayerShared>,
    generation: u64,
    mut signals: mpsc::UnboundedReceiver<TransportSignal>,
) -> AbortHandle {
    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            let Some(player) = player.upgrade() else {
                break;
            };
            player.on_transport_signal(generation, signal).await;
        }
    })
    .abort_handle()
}

impl PlayerShared {
    async fn on_transport_signal(&self, generation: u64, signal: TransportSignal) {
        let mut core = self.core.lock().await;
        if core.generation != generation || core.state == PlayerState::Disposed {
            debug!(player_id = %self.id, ?signal, "Dropping stale transport signal");
            return;
        }

        match signal {
            TransportSignal::Ended => {
                // A paused or already completed source can still report a late end
                if core.state != PlayerState::Playing {
                    debug!(player_id = %self.id, state = %core.state, "Ignoring end-of-stream");
                    return;
                }
                if core.loop_playback() {
                    self.restart_loop(&mut core).await;
                } else {
                    self.complete(&mut core).await;
                }
            }
            TransportSignal::Failed(reason) => {
                if !core.state.has_source() {
                    return;
                }
                self.fail_playback(&mut core, PlaybackError::Decode(reason)).await;
            }
        }
    }

    async fn restart_loop(&self, core: &mut PlayerCore) {
        let restarted = match core.track() {
            Ok(track) => match track.seek(0.0).await {
                Ok(()) => track.start().map_err(PlaybackError::from),
                Err(err) => Err(PlaybackError::from(err)),
            },
            Err(err) => Err(err),
        };
        match restarted {
            Ok(()) => debug!(player_id = %self.id, "Looping to start"),
            Err(err) => self.fail_playback(core, err).await,
        }
    }

    /// Natural end: rewind, give up focus and return to Prepared
    async fn complete(&self, core: &mut PlayerCore) {
        if let Ok(track) = core.track() {
            if let Err(err) = track.seek(0.0).await {
                warn!(player_id = %self.id, error = %err, "Rewind after completion failed");
            }
        }
        core.state = PlayerState::Prepared;
        core.resume_on_gain = false;
        self.release_focus(core).await;
        self.events.emit_lossy(PlayerEvent::completed(self.id));
        info!(player_id = %self.id, "Playback completed");
    }

    /// Unrecoverable transport failure: drop the source and return to Idle
    async fn fail_playback(&self, core: &mut PlayerCore, err: PlaybackError) {
        if let Some(token) = core.pending_seek.take() {
            token.cancel();
        }
        core.release_track();
        core.state = PlayerState::Idle;
        core.resume_on_gain = false;
        self.release_focus(core).await;
        warn!(player_id = %self.id, error = %err, "Playback failed");
        self.events.emit_lossy(PlayerEvent::error(self.id, err.reason()));
    }
}
