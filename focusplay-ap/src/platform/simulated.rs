//! In-process platform collaborators
//!
//! Deterministic stand-ins for the decoder, the OS focus service and the host
//! context. Tracks keep a virtual clock instead of producing samples; tests
//! drive completion and failures through the control methods
//! (`SimulatedTrack::finish`, `SimulatedTrack::fail`,
//! `SimulatedFocusPlatform::emit`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use focusplay_common::{DurationHint, FocusChangeKind};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    AudioSource, ContextStatus, FocusGrant, FocusPlatform, FocusSession, PlatformContext,
    PlatformError, PlatformResult, Track, TransportSignals,
};

/// Catalog entry describing how a simulated asset behaves
#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub duration_secs: f64,
    /// Whether `set_rate` is supported
    pub variable_rate: bool,
    /// Artificial latency of `AudioSource::load`
    pub load_delay: Option<Duration>,
    /// Artificial latency of `Track::seek`
    pub seek_delay: Option<Duration>,
    /// Make `AudioSource::load` fail with this error
    pub load_error: Option<PlatformError>,
}

impl TrackSpec {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            variable_rate: true,
            load_delay: None,
            seek_delay: None,
            load_error: None,
        }
    }

    pub fn fixed_rate(mut self) -> Self {
        self.variable_rate = false;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn with_seek_delay(mut self, delay: Duration) -> Self {
        self.seek_delay = Some(delay);
        self
    }

    pub fn failing(mut self, error: PlatformError) -> Self {
        self.load_error = Some(error);
        self
    }
}

#[derive(Debug)]
struct TrackClock {
    playing: bool,
    /// Position when the clock last started or was set
    anchor_secs: f64,
    started_at: Option<Instant>,
    /// Bumped on every start/pause/seek so stale completion timers are ignored
    run: u64,
    volume: f32,
    rate: f32,
    pitch: f32,
    released: bool,
    start_count: u32,
}

impl TrackClock {
    fn position(&self, duration: f64) -> f64 {
        let elapsed = match (self.playing, self.started_at) {
            (true, Some(at)) => at.elapsed().as_secs_f64() * self.rate as f64,
            _ => 0.0,
        };
        (self.anchor_secs + elapsed).min(duration)
    }

    fn freeze(&mut self, duration: f64) {
        self.anchor_secs = self.position(duration);
        self.started_at = None;
        self.playing = false;
        self.run += 1;
    }
}

/// Simulated transport for one asset
pub struct SimulatedTrack {
    uri: String,
    spec: TrackSpec,
    auto_complete: bool,
    signals: TransportSignals,
    clock: Mutex<TrackClock>,
    self_ref: Weak<SimulatedTrack>,
}

impl SimulatedTrack {
    fn new(uri: &str, spec: TrackSpec, auto_complete: bool, signals: TransportSignals) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            uri: uri.to_string(),
            spec,
            auto_complete,
            signals,
            clock: Mutex::new(TrackClock {
                playing: false,
                anchor_secs: 0.0,
                started_at: None,
                run: 0,
                volume: 1.0,
                rate: 1.0,
                pitch: 1.0,
                released: false,
                start_count: 0,
            }),
            self_ref: self_ref.clone(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Jump to the end and report end-of-stream
    pub fn finish(&self) {
        {
            let mut clock = self.clock.lock();
            clock.freeze(self.spec.duration_secs);
            clock.anchor_secs = self.spec.duration_secs;
        }
        self.signals.ended();
    }

    /// Report a decode failure mid-playback
    pub fn fail(&self, reason: &str) {
        self.clock.lock().freeze(self.spec.duration_secs);
        self.signals.failed(reason);
    }

    pub fn is_running(&self) -> bool {
        self.clock.lock().playing
    }

    pub fn volume(&self) -> f32 {
        self.clock.lock().volume
    }

    pub fn rate(&self) -> f32 {
        self.clock.lock().rate
    }

    pub fn pitch(&self) -> f32 {
        self.clock.lock().pitch
    }

    pub fn is_released(&self) -> bool {
        self.clock.lock().released
    }

    /// Number of times the transport was started
    pub fn start_count(&self) -> u32 {
        self.clock.lock().start_count
    }

    fn schedule_completion(&self, run: u64, remaining_secs: f64, rate: f32) {
        let Some(track) = self.self_ref.upgrade() else {
            return;
        };
        let wait = Duration::from_secs_f64((remaining_secs / rate.max(0.01) as f64).max(0.0));
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let still_running = {
                let clock = track.clock.lock();
                clock.playing && clock.run == run
            };
            if still_running {
                debug!(uri = %track.uri, "Simulated track reached end");
                track.finish();
            }
        });
    }
}

#[async_trait]
impl Track for SimulatedTrack {
    fn duration(&self) -> f64 {
        self.spec.duration_secs
    }

    fn position(&self) -> f64 {
        self.clock.lock().position(self.spec.duration_secs)
    }

    fn start(&self) -> PlatformResult<()> {
        let (run, remaining, rate) = {
            let mut clock = self.clock.lock();
            if clock.released {
                return Err(PlatformError::Unavailable(format!("{} was released", self.uri)));
            }
            if clock.playing {
                return Ok(());
            }
            clock.playing = true;
            clock.started_at = Some(Instant::now());
            clock.run += 1;
            clock.start_count += 1;
            (clock.run, self.spec.duration_secs - clock.anchor_secs, clock.rate)
        };
        if self.auto_complete {
            self.schedule_completion(run, remaining, rate);
        }
        Ok(())
    }

    fn pause(&self) {
        self.clock.lock().freeze(self.spec.duration_secs);
    }

    fn stop(&self) {
        self.clock.lock().freeze(self.spec.duration_secs);
    }

    async fn seek(&self, seconds: f64) -> PlatformResult<()> {
        if let Some(delay) = self.spec.seek_delay {
            tokio::time::sleep(delay).await;
        }
        let restart = {
            let mut clock = self.clock.lock();
            if clock.released {
                return Err(PlatformError::Unavailable(format!("{} was released", self.uri)));
            }
            let was_playing = clock.playing;
            clock.freeze(self.spec.duration_secs);
            clock.anchor_secs = seconds.clamp(0.0, self.spec.duration_secs);
            was_playing
        };
        if restart {
            self.start()?;
        }
        Ok(())
    }

    fn set_volume(&self, volume: f32) {
        self.clock.lock().volume = volume;
    }

    fn set_rate(&self, rate: f32) -> PlatformResult<()> {
        if !self.spec.variable_rate {
            return Err(PlatformError::Unsupported(format!(
                "variable playback rate not available for {}",
                self.uri
            )));
        }
        let mut clock = self.clock.lock();
        let duration = self.spec.duration_secs;
        if clock.playing {
            // Re-anchor so elapsed time before the change keeps the old rate
            clock.anchor_secs = clock.position(duration);
            clock.started_at = Some(Instant::now());
        }
        clock.rate = rate;
        Ok(())
    }

    fn set_pitch(&self, pitch: f32) -> PlatformResult<()> {
        self.clock.lock().pitch = pitch;
        Ok(())
    }

    fn release(&self) {
        let mut clock = self.clock.lock();
        clock.freeze(self.spec.duration_secs);
        clock.released = true;
    }
}

/// Simulated decoder front-end backed by an in-memory catalog
#[derive(Default)]
pub struct SimulatedSource {
    catalog: Mutex<HashMap<String, TrackSpec>>,
    loaded: Mutex<HashMap<String, Arc<SimulatedTrack>>>,
    auto_complete: bool,
    load_count: AtomicUsize,
}

impl SimulatedSource {
    /// Source whose tracks only end when told to (`SimulatedTrack::finish`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose tracks end on their own after their duration elapses
    pub fn real_time() -> Self {
        Self { auto_complete: true, ..Self::default() }
    }

    pub fn with_track(self, uri: &str, spec: TrackSpec) -> Self {
        self.insert(uri, spec);
        self
    }

    pub fn insert(&self, uri: &str, spec: TrackSpec) {
        self.catalog.lock().insert(uri.to_string(), spec);
    }

    /// Most recently loaded track for `uri`
    pub fn track(&self, uri: &str) -> Option<Arc<SimulatedTrack>> {
        self.loaded.lock().get(uri).cloned()
    }

    /// Number of `load` calls that reached the source
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for SimulatedSource {
    async fn load(&self, uri: &str, signals: TransportSignals) -> PlatformResult<Arc<dyn Track>> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        let spec = self
            .catalog
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(uri.to_string()))?;

        if let Some(delay) = spec.load_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = spec.load_error.clone() {
            return Err(err);
        }

        let track = SimulatedTrack::new(uri, spec, self.auto_complete, signals);
        self.loaded.lock().insert(uri.to_string(), track.clone());
        debug!(uri, "Simulated source loaded track");
        Ok(track)
    }
}

#[derive(Debug)]
struct FocusServiceState {
    grant: bool,
    fail_requests: bool,
    active: Option<mpsc::UnboundedSender<FocusChangeKind>>,
    requests: usize,
    releases: usize,
    last_hint: Option<DurationHint>,
}

/// Simulated OS focus service
///
/// Grants every request by default. At most one session is live at a time.
pub struct SimulatedFocusPlatform {
    state: Arc<Mutex<FocusServiceState>>,
}

impl Default for SimulatedFocusPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFocusPlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FocusServiceState {
                grant: true,
                fail_requests: false,
                active: None,
                requests: 0,
                releases: 0,
                last_hint: None,
            })),
        }
    }

    /// Make subsequent requests be refused (`false`) or granted (`true`)
    pub fn set_grant(&self, grant: bool) {
        self.state.lock().grant = grant;
    }

    /// Make subsequent requests fail as if the service were unreachable
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().fail_requests = unreachable;
    }

    /// Push a focus change to the live session; false if none is live
    pub fn emit(&self, kind: FocusChangeKind) -> bool {
        match &self.state.lock().active {
            Some(tx) => tx.send(kind).is_ok(),
            None => false,
        }
    }

    pub fn has_active_session(&self) -> bool {
        self.state.lock().active.is_some()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().releases
    }

    pub fn last_hint(&self) -> Option<DurationHint> {
        self.state.lock().last_hint
    }
}

#[async_trait]
impl FocusPlatform for SimulatedFocusPlatform {
    async fn request(&self, hint: DurationHint) -> PlatformResult<Option<FocusGrant>> {
        let mut state = self.state.lock();
        state.requests += 1;
        state.last_hint = Some(hint);

        if state.fail_requests {
            return Err(PlatformError::Unavailable("focus service not reachable".to_string()));
        }
        if !state.grant {
            return Ok(None);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.active = Some(tx);
        Ok(Some(FocusGrant {
            session: Box::new(SimulatedSession { state: self.state.clone() }),
            changes: rx,
        }))
    }
}

struct SimulatedSession {
    state: Arc<Mutex<FocusServiceState>>,
}

#[async_trait]
impl FocusSession for SimulatedSession {
    async fn release(&self) {
        let mut state = self.state.lock();
        state.active = None;
        state.releases += 1;
    }
}

/// Simulated host context that becomes ready after a number of polls
pub struct SimulatedContext {
    pending_polls: AtomicU32,
    polls: AtomicU32,
}

impl SimulatedContext {
    pub fn ready() -> Self {
        Self::ready_after(0)
    }

    pub fn ready_after(pending_polls: u32) -> Self {
        Self {
            pending_polls: AtomicU32::new(pending_polls),
            polls: AtomicU32::new(0),
        }
    }

    pub fn never_ready() -> Self {
        Self::ready_after(u32::MAX)
    }

    /// Number of times `current` was called
    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

impl PlatformContext for SimulatedContext {
    fn current(&self) -> ContextStatus {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 | u32::MAX => None,
                n => Some(n - 1),
            })
            .unwrap_or_else(|n| n);
        if pending == 0 {
            ContextStatus::Ready
        } else {
            ContextStatus::Pending
        }
    }
}
