//! Platform collaborator interfaces
//!
//! The player core never decodes audio or talks to the OS directly. It calls
//! into these traits instead:
//! - `AudioSource` resolves a URI/path into a playable `Track`
//! - `Track` is the transport handle for one loaded asset
//! - `FocusPlatform` / `FocusSession` wrap the OS audio focus service
//! - `PlatformContext` reports whether the host application is ready
//!
//! `simulated` provides in-process implementations used by the demo binary
//! and the test suite.

pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use focusplay_common::{DurationHint, FocusChangeKind};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by a platform collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    /// URI or path does not resolve to an asset
    #[error("source not found: {0}")]
    NotFound(String),

    /// Read or transport failure
    #[error("I/O failure: {0}")]
    Io(String),

    /// Asset could not be decoded
    #[error("decode failure: {0}")]
    Decode(String),

    /// Capability not supported by this platform or asset
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Platform service could not be reached
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Asynchronous notification from a running track
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// Reached the natural end of the asset
    Ended,
    /// Decode or I/O failure during playback
    Failed(String),
}

/// Sending half handed to `AudioSource::load`
///
/// The track keeps it and reports end-of-stream and failures through it.
#[derive(Debug, Clone)]
pub struct TransportSignals {
    tx: mpsc::UnboundedSender<TransportSignal>,
}

impl TransportSignals {
    /// Create a signal pair; the receiver stays with the player
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn ended(&self) {
        let _ = self.tx.send(TransportSignal::Ended);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        let _ = self.tx.send(TransportSignal::Failed(reason.into()));
    }
}

/// Transport handle for one loaded asset
#[async_trait]
pub trait Track: Send + Sync {
    /// Total duration in seconds
    fn duration(&self) -> f64;

    /// Current position in seconds
    fn position(&self) -> f64;

    /// Start or resume output
    fn start(&self) -> PlatformResult<()>;

    /// Pause output, keeping position
    fn pause(&self);

    /// Stop output
    fn stop(&self);

    /// Move the read position; may suspend on the decoder
    async fn seek(&self, seconds: f64) -> PlatformResult<()>;

    /// Apply output gain (0.0-1.0)
    fn set_volume(&self, volume: f32);

    /// Change playback rate
    fn set_rate(&self, rate: f32) -> PlatformResult<()>;

    /// Change pitch
    fn set_pitch(&self, pitch: f32) -> PlatformResult<()>;

    /// Free decoder resources; the track is unusable afterwards
    fn release(&self);
}

/// Resolves URIs and paths into tracks
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn load(&self, uri: &str, signals: TransportSignals) -> PlatformResult<Arc<dyn Track>>;
}

/// Result of a granted platform focus request
pub struct FocusGrant {
    /// Handle released when the registry empties
    pub session: Box<dyn FocusSession>,
    /// Focus changes pushed by the OS for the lifetime of the session
    pub changes: mpsc::UnboundedReceiver<FocusChangeKind>,
}

impl std::fmt::Debug for FocusGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusGrant").finish_non_exhaustive()
    }
}

/// Platform-level focus session
#[async_trait]
pub trait FocusSession: Send + Sync {
    async fn release(&self);
}

/// OS audio focus service
#[async_trait]
pub trait FocusPlatform: Send + Sync {
    /// Request focus. `Ok(None)` means the OS refused.
    async fn request(&self, hint: DurationHint) -> PlatformResult<Option<FocusGrant>>;
}

/// Host application readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    Ready,
    /// Host still initializing; poll again later
    Pending,
}

/// Host application context lookup
pub trait PlatformContext: Send + Sync {
    fn current(&self) -> ContextStatus;
}

/// Per-player collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn AudioSource>,
    pub context: Arc<dyn PlatformContext>,
}

impl Collaborators {
    pub fn new(source: Arc<dyn AudioSource>, context: Arc<dyn PlatformContext>) -> Self {
        Self { source, context }
    }
}
