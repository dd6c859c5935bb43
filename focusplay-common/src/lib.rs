//! # focusplay Common Library
//!
//! Shared code for the focusplay crates including:
//! - Event types (PlayerEvent enum) and the EventBus
//! - Player state, focus change and duration hint enums
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{DurationHint, EventBus, FocusChangeKind, PlayerEvent, PlayerId, PlayerState};
