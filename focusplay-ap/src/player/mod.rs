//! Audio player
//!
//! `AudioPlayer` is the per-instance playback state machine:
//!
//! ```text
//! Idle --load--> Loading --ok--> Prepared --play--> Playing <--> Paused
//!                   |                ^                 |
//!                   +--fail--> Idle  +----completed----+
//! any --dispose--> Disposed
//! ```
//!
//! Every operation runs under the player's operation lock. Long-running work
//! (loading, seeking) runs on spawned tasks that apply their own result, and
//! only if the player's generation has not moved on in the meantime.

mod options;
mod reaction;
mod state;
mod transport;

use std::sync::{Arc, Weak};

use focusplay_common::{EventBus, PlayerEvent, PlayerId, PlayerState};
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use self::state::PlayerCore;
use crate::config::PlayerSettings;
use crate::error::{PlaybackError, Result};
use crate::focus::{FocusArbitrator, FocusClaim, FocusListener};
use crate::platform::{
    Collaborators, ContextStatus, PlatformContext, PlatformResult, Track, TransportSignal, TransportSignals,
};
use crate::volume::clamp_volume;

pub use options::LoadRequest;

/// Handle to one audio player
///
/// Cloning the handle shares the same player.
#[derive(Clone)]
pub struct AudioPlayer {
    shared: Arc<PlayerShared>,
}

pub(crate) struct PlayerShared {
    id: PlayerId,
    core: Mutex<PlayerCore>,
    events: EventBus,
    arbitrator: Arc<FocusArbitrator>,
    collaborators: Collaborators,
    settings: PlayerSettings,
    self_ref: Weak<PlayerShared>,
}

impl AudioPlayer {
    /// Create an idle player bound to a focus arbitrator
    pub fn new(
        arbitrator: Arc<FocusArbitrator>,
        collaborators: Collaborators,
        settings: PlayerSettings,
    ) -> Self {
        let id = PlayerId::new();
        let shared = Arc::new_cyclic(|self_ref| PlayerShared {
            id,
            core: Mutex::new(PlayerCore::new(clamp_volume(settings.default_volume))),
            events: EventBus::new(settings.event_capacity),
            arbitrator,
            collaborators,
            settings,
            self_ref: self_ref.clone(),
        });
        debug!(player_id = %id, "Player created");
        Self { shared }
    }

    pub fn id(&self) -> PlayerId {
        self.shared.id
    }

    /// Resolve and prepare a source
    ///
    /// Resolves once the player reaches `Prepared` (and, with `auto_play`,
    /// after playback was attempted). A failed auto-play is reported as a
    /// `PlayerEvent::Error`; the load itself still succeeds.
    ///
    /// The transition runs on its own task, so dropping the returned future
    /// does not leave the player in `Loading`.
    pub async fn load(&self, request: LoadRequest) -> Result<()> {
        let shared = &self.shared;
        let done = {
            let mut core = shared.core.lock().await;
            match core.state {
                PlayerState::Idle | PlayerState::Prepared => {}
                PlayerState::Loading => return Err(PlaybackError::ConcurrentOperation("load")),
                state => return Err(PlaybackError::InvalidState { operation: "load", state }),
            }

            // Reload from Prepared discards the previous source
            core.abort_pending();
            core.release_track();
            shared.release_focus(&mut core).await;
            core.resume_on_gain = false;
            core.speed = 1.0;

            core.generation += 1;
            core.state = PlayerState::Loading;
            core.options = Some(request.clone());

            let cancel = CancellationToken::new();
            let (done_tx, done_rx) = oneshot::channel();
            tokio::spawn(run_load(
                shared.self_ref.clone(),
                shared.collaborators.clone(),
                shared.settings,
                core.generation,
                request.clone(),
                cancel.clone(),
                done_tx,
            ));
            core.pending_load = Some(cancel);
            done_rx
        };

        info!(player_id = %shared.id, source = %request.source, "Loading source");
        match done.await {
            Ok(result) => result,
            Err(_) => {
                let state = shared.core.lock().await.state;
                debug!(player_id = %shared.id, state = %state, "Load superseded");
                Err(PlaybackError::InvalidState { operation: "load", state })
            }
        }
    }

    /// Start or resume playback; a no-op when already playing
    pub async fn play(&self) -> Result<()> {
        let mut core = self.shared.core.lock().await;
        self.shared.play_locked(&mut core).await
    }

    /// Pause playback
    ///
    /// With `preserve_focus` the player keeps its focus claim, so a later
    /// `play` does not need a new grant.
    pub async fn pause(&self, preserve_focus: bool) -> Result<()> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        match core.state {
            PlayerState::Playing => {}
            state @ (PlayerState::Idle | PlayerState::Loading) => {
                return Err(PlaybackError::NotPrepared { operation: "pause", state })
            }
            state => return Err(PlaybackError::InvalidState { operation: "pause", state }),
        }

        core.track()?.pause();
        core.state = PlayerState::Paused;
        core.resume_on_gain = false;
        if !preserve_focus {
            shared.release_focus(&mut core).await;
        }
        shared.events.emit_lossy(PlayerEvent::paused(shared.id));
        info!(player_id = %shared.id, preserve_focus, "Playback paused");
        Ok(())
    }

    /// Move the playback position
    ///
    /// The target is clamped to the track duration. Only one seek may be in
    /// flight at a time; it completes even if the returned future is dropped.
    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        let shared = &self.shared;
        let done = {
            let mut core = shared.core.lock().await;
            core.ensure_prepared("seek")?;
            if !seconds.is_finite() {
                return Err(PlaybackError::InvalidState { operation: "seek", state: core.state });
            }
            if core.pending_seek.is_some() {
                return Err(PlaybackError::ConcurrentOperation("seek"));
            }

            let track = core.track()?;
            let target = seconds.clamp(0.0, track.duration().max(0.0));
            let cancel = CancellationToken::new();
            let (done_tx, done_rx) = oneshot::channel();
            tokio::spawn(run_seek(
                shared.self_ref.clone(),
                track,
                core.generation,
                target,
                cancel.clone(),
                done_tx,
            ));
            core.pending_seek = Some(cancel);
            debug!(player_id = %shared.id, target, "Seeking");
            done_rx
        };

        match done.await {
            Ok(result) => result,
            Err(_) => {
                let state = shared.core.lock().await.state;
                Err(PlaybackError::InvalidState { operation: "seek", state })
            }
        }
    }

    /// Change the playback rate; `1.0` is normal speed
    pub async fn set_speed(&self, rate: f32) -> Result<()> {
        let mut core = self.shared.core.lock().await;
        core.ensure_prepared("set speed")?;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PlaybackError::UnsupportedOperation(format!(
                "playback rate must be positive, got {rate}"
            )));
        }
        core.track()?.set_rate(rate)?;
        core.speed = rate;
        debug!(player_id = %self.shared.id, rate, "Playback rate changed");
        Ok(())
    }

    /// Set the output volume, clamped to 0.0-1.0
    ///
    /// During a duck the value becomes the level restored on regain; the
    /// applied volume stays ducked.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let mut core = self.shared.core.lock().await;
        core.ensure_not_disposed("set volume")?;
        let volume = clamp_volume(volume);

        let applied = if core.ducked_from.is_some() {
            let (ducked, saved) = self.shared.settings.volume_policy.duck(volume);
            core.ducked_from = Some(saved);
            ducked
        } else {
            volume
        };
        core.volume = applied;
        if let Some(track) = &core.track {
            track.set_volume(applied);
        }
        Ok(())
    }

    /// Volume currently applied to the output
    pub async fn volume(&self) -> f32 {
        self.shared.core.lock().await.volume
    }

    /// Track duration in seconds; `0.0` without a source
    pub async fn duration(&self) -> f64 {
        let core = self.shared.core.lock().await;
        core.track.as_ref().map(|t| t.duration()).unwrap_or(0.0)
    }

    /// Playback position in seconds; `0.0` without a source
    pub async fn current_time(&self) -> f64 {
        let core = self.shared.core.lock().await;
        core.track.as_ref().map(|t| t.position()).unwrap_or(0.0)
    }

    pub async fn is_playing(&self) -> bool {
        self.shared.core.lock().await.state == PlayerState::Playing
    }

    pub async fn state(&self) -> PlayerState {
        self.shared.core.lock().await.state
    }

    /// Subscribe to this player's events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    /// This player's events as a stream; lagged receivers skip ahead
    pub fn events(&self) -> impl Stream<Item = PlayerEvent> + Send + 'static {
        let player_id = self.shared.id;
        BroadcastStream::new(self.shared.events.subscribe()).filter_map(move |result| async move {
            match result {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(player_id = %player_id, error = %err, "Event subscriber lagged");
                    None
                }
            }
        })
    }

    /// Release the source and leave the focus registry
    ///
    /// Idempotent. Any pending load or seek resolves with `InvalidState`.
    pub async fn dispose(&self) {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        if core.state == PlayerState::Disposed {
            return;
        }

        core.generation += 1;
        core.abort_pending();
        core.release_track();
        core.state = PlayerState::Disposed;
        core.holds_focus = false;
        core.ducked_from = None;
        core.resume_on_gain = false;
        // Registration can outlive the holder flag (explicit `register`)
        shared.arbitrator.abandon_focus(shared.id).await;
        info!(player_id = %shared.id, "Player disposed");
    }
}

impl std::fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPlayer").field("id", &self.shared.id).finish_non_exhaustive()
    }
}

impl PlayerShared {
    fn claim(&self, mix_with_others: bool) -> FocusClaim {
        let listener: Weak<dyn FocusListener> = self.self_ref.clone();
        FocusClaim::new(self.id, mix_with_others, listener)
    }

    pub(crate) async fn play_locked(&self, core: &mut PlayerCore) -> Result<()> {
        match core.state {
            PlayerState::Playing => return Ok(()),
            PlayerState::Prepared | PlayerState::Paused => {}
            state @ (PlayerState::Idle | PlayerState::Loading) => {
                return Err(PlaybackError::NotPrepared { operation: "play", state })
            }
            state => return Err(PlaybackError::InvalidState { operation: "play", state }),
        }
        let track = core.track()?;

        if !self.arbitrator.request_focus(&self.claim(core.mix_with_others())).await {
            info!(player_id = %self.id, "Focus denied");
            return Err(PlaybackError::FocusDenied);
        }
        core.holds_focus = true;

        if let Some(pitch) = core.pitch() {
            if let Err(err) = track.set_pitch(pitch) {
                warn!(player_id = %self.id, pitch, error = %err, "Pitch not applied");
            }
        }
        if (core.speed - 1.0).abs() > f32::EPSILON {
            if let Err(err) = track.set_rate(core.speed) {
                warn!(player_id = %self.id, rate = core.speed, error = %err, "Rate not applied");
            }
        }

        if let Err(err) = track.start() {
            self.release_focus(core).await;
            let err = PlaybackError::from(err);
            self.events.emit_lossy(PlayerEvent::error(self.id, err.reason()));
            return Err(err);
        }

        core.resume_on_gain = false;
        core.state = PlayerState::Playing;
        self.events.emit_lossy(PlayerEvent::started(self.id));
        info!(player_id = %self.id, "Playback started");
        Ok(())
    }

    /// Give up the focus claim, undoing any duck in progress
    pub(crate) async fn release_focus(&self, core: &mut PlayerCore) {
        if !core.holds_focus {
            return;
        }
        self.arbitrator.abandon_focus(self.id).await;
        core.holds_focus = false;
        self.unduck(core);
    }

    /// Apply a fetched source, unless a reload or dispose moved the player on
    async fn finish_load(
        &self,
        generation: u64,
        request: &LoadRequest,
        outcome: Result<Arc<dyn Track>>,
        signals: mpsc::UnboundedReceiver<TransportSignal>,
    ) -> Result<()> {
        let mut core = self.core.lock().await;
        if core.generation != generation || core.state != PlayerState::Loading {
            if let Ok(track) = outcome {
                track.release();
            }
            debug!(player_id = %self.id, state = %core.state, "Load superseded");
            return Err(PlaybackError::InvalidState { operation: "load", state: core.state });
        }
        core.pending_load = None;

        let track = match outcome {
            Ok(track) => track,
            Err(err) => return Err(self.fail_load(&mut core, err)),
        };

        let volume = request
            .volume
            .map(clamp_volume)
            .unwrap_or_else(|| clamp_volume(self.settings.default_volume));
        track.set_volume(volume);
        core.volume = volume;
        core.ducked_from = None;
        core.track = Some(track);
        core.state = PlayerState::Prepared;
        core.signal_watcher = Some(transport::spawn_signal_watcher(
            self.self_ref.clone(),
            generation,
            signals,
        ));
        info!(player_id = %self.id, source = %request.source, "Source prepared");

        if request.auto_play {
            match self.play_locked(&mut core).await {
                Ok(()) => {}
                Err(PlaybackError::FocusDenied) => {
                    warn!(player_id = %self.id, "Auto-play denied focus");
                    self.events
                        .emit_lossy(PlayerEvent::error(self.id, PlaybackError::FocusDenied.reason()));
                }
                // Start failures already emitted their own event
                Err(err) => warn!(player_id = %self.id, error = %err, "Auto-play failed"),
            }
        }
        Ok(())
    }

    /// Report a finished seek if it still belongs to the current source
    async fn finish_seek(
        &self,
        generation: u64,
        target: f64,
        outcome: PlatformResult<()>,
    ) -> Result<()> {
        let mut core = self.core.lock().await;
        if core.generation != generation || !core.state.has_source() {
            return Err(PlaybackError::InvalidState { operation: "seek", state: core.state });
        }
        core.pending_seek = None;

        match outcome {
            Ok(()) => {
                self.events.emit_lossy(PlayerEvent::seek(self.id, target));
                Ok(())
            }
            Err(err) => {
                let err = PlaybackError::from(err);
                self.events.emit_lossy(PlayerEvent::error(self.id, err.reason()));
                Err(err)
            }
        }
    }

    fn fail_load(&self, core: &mut PlayerCore, err: PlaybackError) -> PlaybackError {
        core.state = PlayerState::Idle;
        warn!(player_id = %self.id, error = %err, "Load failed");
        self.events.emit_lossy(PlayerEvent::error(self.id, err.reason()));
        err
    }
}

impl Drop for PlayerShared {
    /// Last handle gone without `dispose`: free the source and leave the registry
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if core.state == PlayerState::Disposed {
            return;
        }
        core.abort_pending();
        core.release_track();

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let arbitrator = self.arbitrator.clone();
            let id = self.id;
            runtime.spawn(async move { arbitrator.abandon_focus(id).await });
        }
        debug!(player_id = %self.id, "Player dropped without dispose");
    }
}

/// Load task: fetch the source, then drive Loading to Prepared or Idle
///
/// Only the fetch stage is cancellable. Cancelling drops `done`, which the
/// waiting caller reads as a superseded load.
async fn run_load(
    player: Weak<PlayerShared>,
    collaborators: Collaborators,
    settings: PlayerSettings,
    generation: u64,
    request: LoadRequest,
    cancel: CancellationToken,
    done: oneshot::Sender<Result<()>>,
) {
    let (signals, signal_rx) = TransportSignals::channel();
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return,
        outcome = fetch_track(collaborators, settings, request.source.clone(), signals) => outcome,
    };

    let Some(shared) = player.upgrade() else {
        if let Ok(track) = outcome {
            track.release();
        }
        return;
    };
    let result = shared.finish_load(generation, &request, outcome, signal_rx).await;
    drop(shared);
    let _ = done.send(result);
}

/// Seek task; the caller may stop waiting without leaving the seek pending
async fn run_seek(
    player: Weak<PlayerShared>,
    track: Arc<dyn Track>,
    generation: u64,
    target: f64,
    cancel: CancellationToken,
    done: oneshot::Sender<Result<()>>,
) {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return,
        outcome = track.seek(target) => outcome,
    };
    drop(track);

    let Some(shared) = player.upgrade() else {
        return;
    };
    let result = shared.finish_seek(generation, target, outcome).await;
    drop(shared);
    let _ = done.send(result);
}

/// Wait for the host context, then resolve the source
async fn fetch_track(
    collaborators: Collaborators,
    settings: PlayerSettings,
    uri: String,
    signals: TransportSignals,
) -> Result<Arc<dyn Track>> {
    wait_for_context(collaborators.context.as_ref(), &settings).await?;
    collaborators
        .source
        .load(&uri, signals)
        .await
        .map_err(PlaybackError::from_load_failure)
}

async fn wait_for_context(context: &dyn PlatformContext, settings: &PlayerSettings) -> Result<()> {
    let polls = settings.context_retry_attempts.max(1);
    for attempt in 1..=polls {
        if context.current() == ContextStatus::Ready {
            return Ok(());
        }
        if attempt < polls {
            debug!(attempt, "Platform context not ready, retrying");
            tokio::time::sleep(settings.context_retry_interval).await;
        }
    }
    Err(PlaybackError::Load {
        reason: format!("platform context not ready after {polls} attempts"),
    })
}
