//! Error types for focusplay-ap
//!
//! Defines the player error taxonomy using thiserror. Synchronous precondition
//! failures (`InvalidState`, `NotPrepared`, `ConcurrentOperation`) are returned
//! before any side effect. Asynchronous platform failures (`Load`, `Decode`,
//! `Internal`) are also emitted as `PlayerEvent::Error` with the same detail.

use focusplay_common::PlayerState;
use thiserror::Error;

use crate::platform::PlatformError;

/// Main error type for player and arbitration operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Operation illegal from the current state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PlayerState,
    },

    /// Operation requires a loaded source
    #[error("Not prepared: cannot {operation} while {state}")]
    NotPrepared {
        operation: &'static str,
        state: PlayerState,
    },

    /// The focus arbitrator refused the output
    #[error("Focus denied")]
    FocusDenied,

    /// Another operation of the same kind is in flight
    #[error("Concurrent operation: {0} already in progress")]
    ConcurrentOperation(&'static str),

    /// Source could not be loaded
    #[error("Load error: {reason}")]
    Load { reason: String },

    /// Source decoded badly during playback or seek
    #[error("Decode error: {0}")]
    Decode(String),

    /// Capability not available for the current source or state
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Unexpected platform failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Reason string used for the matching `PlayerEvent::Error`
    pub fn reason(&self) -> String {
        match self {
            PlaybackError::Load { reason } => reason.clone(),
            PlaybackError::Decode(reason)
            | PlaybackError::UnsupportedOperation(reason)
            | PlaybackError::Internal(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Map a platform failure raised while loading a source
    pub fn from_load_failure(err: PlatformError) -> Self {
        PlaybackError::Load { reason: err.to_string() }
    }
}

impl From<PlatformError> for PlaybackError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Decode(msg) => PlaybackError::Decode(msg),
            PlatformError::Unsupported(msg) => PlaybackError::UnsupportedOperation(msg),
            other => PlaybackError::Internal(other.to_string()),
        }
    }
}

/// Convenience Result type using PlaybackError
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_state() {
        let err = PlaybackError::InvalidState { operation: "seek", state: PlayerState::Disposed };
        assert_eq!(err.to_string(), "Invalid state: cannot seek while disposed");

        let err = PlaybackError::NotPrepared { operation: "play", state: PlayerState::Loading };
        assert_eq!(err.to_string(), "Not prepared: cannot play while loading");
    }

    #[test]
    fn test_platform_error_mapping() {
        assert_eq!(
            PlaybackError::from(PlatformError::Decode("bad frame".into())),
            PlaybackError::Decode("bad frame".into())
        );
        assert_eq!(
            PlaybackError::from(PlatformError::Unsupported("rate".into())),
            PlaybackError::UnsupportedOperation("rate".into())
        );
        assert!(matches!(
            PlaybackError::from(PlatformError::Unavailable("gone".into())),
            PlaybackError::Internal(_)
        ));
    }

    #[test]
    fn test_load_failure_reason_is_platform_message() {
        let err = PlaybackError::from_load_failure(PlatformError::NotFound("track.mp3".into()));
        assert_eq!(err.reason(), PlatformError::NotFound("track.mp3".into()).to_string());
        assert!(matches!(err, PlaybackError::Load { .. }));
    }
}
