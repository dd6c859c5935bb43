//! Test helpers for focusplay-ap integration tests
//!
//! Provides a `TestRig` bundling one arbitrator with simulated platform
//! collaborators, plus event assertions with timeouts.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use focusplay_ap::platform::simulated::{
    SimulatedContext, SimulatedFocusPlatform, SimulatedSource, SimulatedTrack, TrackSpec,
};
use focusplay_ap::platform::Collaborators;
use focusplay_ap::{AudioPlayer, FocusArbitrator, FocusSettings, PlayerSettings};
use focusplay_common::PlayerEvent;
use tokio::sync::broadcast;

/// Default test track
pub const TRACK: &str = "track.mp3";
/// Second catalog entry for multi-player tests
pub const OTHER_TRACK: &str = "other.mp3";

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// One arbitration scope with manually driven platform collaborators
pub struct TestRig {
    pub platform: Arc<SimulatedFocusPlatform>,
    pub source: Arc<SimulatedSource>,
    pub context: Arc<SimulatedContext>,
    pub arbitrator: Arc<FocusArbitrator>,
    pub settings: PlayerSettings,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_context(SimulatedContext::ready())
    }

    pub fn with_context(context: SimulatedContext) -> Self {
        let source = SimulatedSource::new()
            .with_track(TRACK, TrackSpec::new(120.0))
            .with_track(OTHER_TRACK, TrackSpec::new(60.0));
        let platform = Arc::new(SimulatedFocusPlatform::new());
        let arbitrator = Arc::new(FocusArbitrator::new(platform.clone(), FocusSettings::default()));
        Self {
            platform,
            source: Arc::new(source),
            context: Arc::new(context),
            arbitrator,
            settings: test_settings(),
        }
    }

    pub fn player(&self) -> AudioPlayer {
        let collaborators = Collaborators::new(self.source.clone(), self.context.clone());
        AudioPlayer::new(self.arbitrator.clone(), collaborators, self.settings)
    }

    /// Latest simulated track loaded for `uri`
    pub fn track(&self, uri: &str) -> Arc<SimulatedTrack> {
        self.source.track(uri).expect("track was never loaded")
    }
}

/// Player settings with a short context retry interval
pub fn test_settings() -> PlayerSettings {
    PlayerSettings {
        context_retry_attempts: 5,
        context_retry_interval: Duration::from_millis(1),
        ..PlayerSettings::default()
    }
}

/// Next event, failing the test after a timeout
pub async fn next_event(rx: &mut broadcast::Receiver<PlayerEvent>) -> PlayerEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for player event")
        .expect("event channel closed")
}

/// Skip events until one named `name` arrives
pub async fn wait_for_event(rx: &mut broadcast::Receiver<PlayerEvent>, name: &str) -> PlayerEvent {
    loop {
        let event = next_event(rx).await;
        if event.name() == name {
            return event;
        }
    }
}

/// Assert nothing is pending on the channel
pub fn assert_no_event(rx: &mut broadcast::Receiver<PlayerEvent>) {
    match rx.try_recv() {
        Err(broadcast::error::TryRecvError::Empty) => {}
        other => panic!("expected no event, got {:?}", other),
    }
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
