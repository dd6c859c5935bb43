//! Event types for the focusplay event system
//!
//! Provides the per-player event definitions and the EventBus that carries them.

// Sub-modules (supporting types)
mod playback_types;

pub use playback_types::{DurationHint, FocusChangeKind, PlayerId, PlayerState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Every variant carries the emitting player's id and a timestamp. Events are
/// broadcast via EventBus and can be serialized for external consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Transport started (from Prepared, Paused, or a focus-gain resume)
    Started {
        player_id: PlayerId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transport paused (caller pause or focus loss)
    Paused {
        player_id: PlayerId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Seek completed
    Seek {
        player_id: PlayerId,
        /// Position after the seek, in seconds
        position_secs: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback reached its natural end (never emitted while looping)
    Completed {
        player_id: PlayerId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Load, decode, or transport failure
    ///
    /// `reason` matches the detail of the error returned to the triggering call.
    Error {
        player_id: PlayerId,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Platform focus changed for this player
    FocusChange {
        player_id: PlayerId,
        kind: FocusChangeKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    pub fn started(player_id: PlayerId) -> Self {
        PlayerEvent::Started { player_id, timestamp: chrono::Utc::now() }
    }

    pub fn paused(player_id: PlayerId) -> Self {
        PlayerEvent::Paused { player_id, timestamp: chrono::Utc::now() }
    }

    pub fn seek(player_id: PlayerId, position_secs: f64) -> Self {
        PlayerEvent::Seek { player_id, position_secs, timestamp: chrono::Utc::now() }
    }

    pub fn completed(player_id: PlayerId) -> Self {
        PlayerEvent::Completed { player_id, timestamp: chrono::Utc::now() }
    }

    pub fn error(player_id: PlayerId, reason: impl Into<String>) -> Self {
        PlayerEvent::Error { player_id, reason: reason.into(), timestamp: chrono::Utc::now() }
    }

    pub fn focus_change(player_id: PlayerId, kind: FocusChangeKind) -> Self {
        PlayerEvent::FocusChange { player_id, kind, timestamp: chrono::Utc::now() }
    }

    /// Id of the player that emitted this event
    pub fn player_id(&self) -> PlayerId {
        match self {
            PlayerEvent::Started { player_id, .. }
            | PlayerEvent::Paused { player_id, .. }
            | PlayerEvent::Seek { player_id, .. }
            | PlayerEvent::Completed { player_id, .. }
            | PlayerEvent::Error { player_id, .. }
            | PlayerEvent::FocusChange { player_id, .. } => *player_id,
        }
    }

    /// Short event name, as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Started { .. } => "started",
            PlayerEvent::Paused { .. } => "paused",
            PlayerEvent::Seek { .. } => "seek",
            PlayerEvent::Completed { .. } => "completed",
            PlayerEvent::Error { .. } => "error",
            PlayerEvent::FocusChange { .. } => "focusChange",
        }
    }

    /// True for the notifications that end a playback (`Completed`, `Error`)
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerEvent::Completed { .. } | PlayerEvent::Error { .. })
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Event distribution bus for a single player
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the player)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use focusplay_common::events::{EventBus, PlayerEvent, PlayerId};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PlayerEvent::started(PlayerId::new()));
/// assert_eq!(rx.try_recv().unwrap().name(), "started");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}
