//! Focus registry and arbitration
//!
//! **Responsibilities:**
//! - Track which players are registered and which hold the focus token
//! - Own the single platform focus session and its change subscription
//! - Fan platform focus changes out to the players holding focus
//!
//! All registry mutations are serialized by one async mutex, so
//! `holders ⊆ registered` holds after every call. The mutex is never held
//! while a player reacts to a focus change; reactions may call back into
//! `abandon_focus`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use focusplay_common::{DurationHint, FocusChangeKind, PlayerId};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{FocusClaim, FocusListener};
use crate::config::FocusSettings;
use crate::platform::{FocusPlatform, FocusSession};

struct Registrant {
    listener: Weak<dyn FocusListener>,
    mix_with_others: bool,
}

/// Live platform session plus the token that ends its subscription
struct ActiveSession {
    session: Box<dyn FocusSession>,
    subscription: CancellationToken,
}

impl ActiveSession {
    async fn close(self) {
        self.subscription.cancel();
        self.session.release().await;
    }
}

#[derive(Default)]
struct Registry {
    registered: HashMap<PlayerId, Registrant>,
    holders: HashSet<PlayerId>,
    session: Option<ActiveSession>,
}

impl Registry {
    fn insert(&mut self, claim: &FocusClaim) {
        self.registered.insert(
            claim.id,
            Registrant {
                listener: claim.listener.clone(),
                mix_with_others: claim.mix_with_others,
            },
        );
    }

    /// Remove a player from both sets; hands back the session if the registry emptied
    fn remove(&mut self, id: &PlayerId) -> (bool, Option<ActiveSession>) {
        let was_registered = self.registered.remove(id).is_some();
        self.holders.remove(id);
        let emptied = if self.registered.is_empty() { self.session.take() } else { None };
        (was_registered, emptied)
    }

    /// Remove players whose handles were all dropped; hands back the session if the registry emptied
    fn prune_dropped(&mut self) -> Option<ActiveSession> {
        let dropped: Vec<PlayerId> = self
            .registered
            .iter()
            .filter(|(_, registrant)| registrant.listener.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut emptied = None;
        for id in dropped {
            debug!(player = %id, "Pruning dropped player from focus registry");
            if let (_, Some(active)) = self.remove(&id) {
                emptied = Some(active);
            }
        }
        emptied
    }
}

/// Arbitrates the shared audio output between players in one scope
///
/// Construct one per scope and share it by `Arc`. Independent arbitrators do
/// not see each other's players.
pub struct FocusArbitrator {
    registry: Arc<Mutex<Registry>>,
    platform: Arc<dyn FocusPlatform>,
    duration_hint: DurationHint,
}

impl FocusArbitrator {
    pub fn new(platform: Arc<dyn FocusPlatform>, settings: FocusSettings) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            platform,
            duration_hint: settings.duration_hint,
        }
    }

    pub fn duration_hint(&self) -> DurationHint {
        self.duration_hint
    }

    /// Add a player to the registry without requesting focus
    pub async fn register(&self, claim: &FocusClaim) {
        let mut registry = self.registry.lock().await;
        if !registry.registered.contains_key(&claim.id) {
            registry.insert(claim);
            debug!(player = %claim.id, "Registered with focus arbitrator");
        }
    }

    /// Ask for the right to produce sound
    ///
    /// Returns true exactly when the player ends up allowed to play. A cached
    /// grant is returned without touching the platform.
    pub async fn request_focus(&self, claim: &FocusClaim) -> bool {
        let mut registry = self.registry.lock().await;

        if registry.holders.contains(&claim.id) {
            return true;
        }

        if let Some(active) = registry.prune_dropped() {
            active.close().await;
            info!("Dropped players left the registry empty, platform focus session released");
        }

        if registry.session.is_none() {
            return self.request_platform_focus(&mut registry, claim).await;
        }

        if claim.mix_with_others || registry.holders.is_empty() {
            registry.insert(claim);
            registry.holders.insert(claim.id);
            info!(
                player = %claim.id,
                mix = claim.mix_with_others,
                holders = registry.holders.len(),
                "Focus granted from existing session"
            );
            return true;
        }

        debug!(player = %claim.id, "Focus denied: token held by another player");
        false
    }

    async fn request_platform_focus(&self, registry: &mut Registry, claim: &FocusClaim) -> bool {
        match self.platform.request(self.duration_hint).await {
            Ok(Some(grant)) => {
                let subscription = CancellationToken::new();
                tokio::spawn(fan_out(
                    Arc::downgrade(&self.registry),
                    grant.changes,
                    subscription.clone(),
                ));
                registry.session = Some(ActiveSession {
                    session: grant.session,
                    subscription,
                });
                registry.insert(claim);
                registry.holders.insert(claim.id);
                info!(player = %claim.id, hint = %self.duration_hint, "Platform focus granted");
                true
            }
            Ok(None) => {
                info!(player = %claim.id, "Platform refused focus");
                false
            }
            Err(e) => {
                warn!(player = %claim.id, error = %e, "Platform focus request failed, treating as denied");
                false
            }
        }
    }

    /// Drop a player's registration and any focus it holds
    ///
    /// Releases the platform session when the registry empties. Focus is not
    /// re-requested for the remaining players.
    pub async fn abandon_focus(&self, id: PlayerId) {
        let mut registry = self.registry.lock().await;
        let (was_registered, emptied) = registry.remove(&id);
        if was_registered {
            debug!(player = %id, "Abandoned focus");
        }
        if let Some(active) = emptied {
            active.close().await;
            info!("Registry empty, platform focus session released");
        }
    }

    /// Players currently holding the token, sorted
    pub async fn holders(&self) -> Vec<PlayerId> {
        let mut holders: Vec<_> = self.registry.lock().await.holders.iter().copied().collect();
        holders.sort();
        holders
    }

    /// Players currently registered, sorted
    pub async fn registered(&self) -> Vec<PlayerId> {
        let mut registered: Vec<_> = self.registry.lock().await.registered.keys().copied().collect();
        registered.sort();
        registered
    }

    pub async fn is_registered(&self, id: PlayerId) -> bool {
        self.registry.lock().await.registered.contains_key(&id)
    }

    pub async fn holds_focus(&self, id: PlayerId) -> bool {
        self.registry.lock().await.holders.contains(&id)
    }

    /// Whether a registered player declared `mix_with_others`
    pub async fn is_mixing(&self, id: PlayerId) -> Option<bool> {
        self.registry.lock().await.registered.get(&id).map(|r| r.mix_with_others)
    }

    pub async fn has_session(&self) -> bool {
        self.registry.lock().await.session.is_some()
    }
}

/// Deliver platform focus changes to every player holding focus
///
/// Ends when the subscription is cancelled, the platform closes the stream,
/// or the arbitrator is dropped.
async fn fan_out(
    registry: Weak<Mutex<Registry>>,
    mut changes: mpsc::UnboundedReceiver<FocusChangeKind>,
    subscription: CancellationToken,
) {
    loop {
        let kind = tokio::select! {
            _ = subscription.cancelled() => break,
            change = changes.recv() => match change {
                Some(kind) => kind,
                None => break,
            },
        };

        let Some(shared) = registry.upgrade() else {
            break;
        };

        let listeners = {
            let mut guard = shared.lock().await;
            if subscription.is_cancelled() {
                break;
            }

            if let Some(active) = guard.prune_dropped() {
                active.close().await;
            }
            let live: Vec<_> = guard
                .holders
                .iter()
                .filter_map(|id| {
                    let listener = guard.registered.get(id)?.listener.upgrade()?;
                    Some((*id, listener))
                })
                .collect();
            live
        };
        drop(shared);

        info!(kind = %kind, players = listeners.len(), "Dispatching platform focus change");
        for (id, listener) in listeners {
            debug!(player = %id, kind = %kind, "Focus change delivered");
            listener.on_focus_change(kind).await;
        }
    }
    debug!("Focus change subscription ended");
}
