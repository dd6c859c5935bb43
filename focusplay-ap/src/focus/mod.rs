//! Audio focus arbitration

pub mod arbitrator;

use std::sync::Weak;

use async_trait::async_trait;
use focusplay_common::{FocusChangeKind, PlayerId};

pub use arbitrator::FocusArbitrator;

/// Receives platform focus changes routed by the arbitrator
#[async_trait]
pub trait FocusListener: Send + Sync {
    async fn on_focus_change(&self, kind: FocusChangeKind);
}

/// A player's identity as seen by the arbitrator
///
/// The listener is held weakly; a dropped player stops receiving changes and
/// is pruned from the registry.
#[derive(Clone)]
pub struct FocusClaim {
    pub id: PlayerId,
    pub mix_with_others: bool,
    pub listener: Weak<dyn FocusListener>,
}

impl FocusClaim {
    pub fn new(id: PlayerId, mix_with_others: bool, listener: Weak<dyn FocusListener>) -> Self {
        Self { id, mix_with_others, listener }
    }
}

impl std::fmt::Debug for FocusClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusClaim")
            .field("id", &self.id)
            .field("mix_with_others", &self.mix_with_others)
            .finish_non_exhaustive()
    }
}
