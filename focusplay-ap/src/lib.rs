//! # focusplay Audio Player Library (focusplay-ap)
//!
//! Audio playback with cooperative audio focus.
//!
//! **Purpose:** Drive per-player playback state machines over a pluggable
//! platform layer, arbitrate a single platform focus session between all
//! players in the process, and duck or restore volume on transient losses.
//!
//! **Layout:**
//! - `player` - `AudioPlayer` state machine and its event stream
//! - `focus` - `FocusArbitrator` and the listener interface players implement
//! - `volume` - `VolumePolicy` duck/restore arithmetic
//! - `platform` - collaborator traits plus in-process simulations

pub mod config;
pub mod error;
pub mod focus;
pub mod platform;
pub mod player;
pub mod volume;

pub use config::{FocusSettings, PlayerSettings, Settings};
pub use error::{PlaybackError, Result};
pub use focus::{FocusArbitrator, FocusClaim, FocusListener};
pub use player::{AudioPlayer, LoadRequest};
pub use volume::VolumePolicy;
