//! Focus arbitration integration tests
//!
//! Exclusivity, mixing, platform refusal and registry bookkeeping across
//! several players sharing one `FocusArbitrator`.

mod helpers;

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use focusplay_ap::platform::simulated::SimulatedFocusPlatform;
use focusplay_ap::{FocusArbitrator, FocusClaim, FocusListener, FocusSettings, LoadRequest, PlaybackError};
use focusplay_common::{DurationHint, FocusChangeKind, PlayerId, PlayerState};

use helpers::{TestRig, OTHER_TRACK, TRACK};

struct Silent;

#[async_trait]
impl FocusListener for Silent {
    async fn on_focus_change(&self, _kind: FocusChangeKind) {}
}

fn claim(listener: &Arc<dyn FocusListener>, mix: bool) -> FocusClaim {
    FocusClaim::new(PlayerId::new(), mix, Arc::downgrade(listener))
}

#[tokio::test]
async fn test_exclusive_players_take_turns() {
    let rig = TestRig::new();
    let a = rig.player();
    let b = rig.player();
    a.load(LoadRequest::new(TRACK)).await.unwrap();
    b.load(LoadRequest::new(OTHER_TRACK)).await.unwrap();

    a.play().await.unwrap();

    let err = b.play().await.unwrap_err();
    assert_eq!(err, PlaybackError::FocusDenied);
    assert_eq!(b.state().await, PlayerState::Prepared);
    assert!(!rig.track(OTHER_TRACK).is_running());
    // Denial came from the registry, not the platform
    assert_eq!(rig.platform.request_count(), 1);
    assert_eq!(rig.arbitrator.holders().await, vec![a.id()]);

    a.pause(false).await.unwrap();
    b.play().await.unwrap();
    assert!(b.is_playing().await);
    assert_eq!(rig.arbitrator.holders().await, vec![b.id()]);
}

#[tokio::test]
async fn test_mixing_player_plays_alongside_holder() {
    let rig = TestRig::new();
    let music = rig.player();
    let alert = rig.player();
    music.load(LoadRequest::new(TRACK)).await.unwrap();
    alert
        .load(LoadRequest::new(OTHER_TRACK).with_mix_with_others(true))
        .await
        .unwrap();

    music.play().await.unwrap();
    alert.play().await.unwrap();

    assert!(music.is_playing().await);
    assert!(alert.is_playing().await);
    let mut expected = vec![music.id(), alert.id()];
    expected.sort();
    assert_eq!(rig.arbitrator.holders().await, expected);
    assert_eq!(rig.arbitrator.is_mixing(alert.id()).await, Some(true));
    assert_eq!(rig.platform.request_count(), 1);
}

#[tokio::test]
async fn test_session_released_when_last_player_leaves() {
    let rig = TestRig::new();
    let music = rig.player();
    let alert = rig.player();
    music.load(LoadRequest::new(TRACK)).await.unwrap();
    alert
        .load(LoadRequest::new(OTHER_TRACK).with_mix_with_others(true))
        .await
        .unwrap();
    music.play().await.unwrap();
    alert.play().await.unwrap();

    music.dispose().await;
    assert!(rig.platform.has_active_session());
    assert_eq!(rig.arbitrator.holders().await, vec![alert.id()]);

    alert.pause(false).await.unwrap();
    assert!(!rig.platform.has_active_session());
    assert!(!rig.arbitrator.has_session().await);
    assert_eq!(rig.platform.release_count(), 1);
}

#[tokio::test]
async fn test_remaining_players_keep_ownership() {
    let rig = TestRig::new();
    let first = rig.player();
    let second = rig.player();
    first.load(LoadRequest::new(TRACK)).await.unwrap();
    second
        .load(LoadRequest::new(OTHER_TRACK).with_mix_with_others(true))
        .await
        .unwrap();
    first.play().await.unwrap();
    second.play().await.unwrap();

    first.pause(false).await.unwrap();

    // No new platform request on behalf of the remaining holder
    assert_eq!(rig.platform.request_count(), 1);
    assert!(second.is_playing().await);
    assert!(rig.arbitrator.holds_focus(second.id()).await);
}

#[tokio::test]
async fn test_platform_refusal_is_focus_denied() {
    let rig = TestRig::new();
    rig.platform.set_grant(false);
    let player = rig.player();
    player.load(LoadRequest::new(TRACK)).await.unwrap();

    assert_eq!(player.play().await.unwrap_err(), PlaybackError::FocusDenied);
    assert_eq!(player.state().await, PlayerState::Prepared);
    assert!(!rig.arbitrator.is_registered(player.id()).await);
    assert!(!rig.arbitrator.has_session().await);

    rig.platform.set_grant(true);
    player.play().await.unwrap();
    assert!(player.is_playing().await);
}

#[tokio::test]
async fn test_unreachable_platform_is_focus_denied() {
    let rig = TestRig::new();
    rig.platform.set_unreachable(true);
    let player = rig.player();
    player.load(LoadRequest::new(TRACK)).await.unwrap();

    assert_eq!(player.play().await.unwrap_err(), PlaybackError::FocusDenied);
    assert!(rig.arbitrator.registered().await.is_empty());
}

#[tokio::test]
async fn test_auto_play_denied_reports_error_event() {
    let rig = TestRig::new();
    let holder = rig.player();
    holder.load(LoadRequest::new(TRACK)).await.unwrap();
    holder.play().await.unwrap();

    let late = rig.player();
    let mut rx = late.subscribe();
    late.load(LoadRequest::new(OTHER_TRACK).with_auto_play(true))
        .await
        .unwrap();

    assert_eq!(late.state().await, PlayerState::Prepared);
    let event = helpers::next_event(&mut rx).await;
    assert_eq!(event.name(), "error");
}

#[tokio::test]
async fn test_duration_hint_passed_to_platform() {
    let platform = Arc::new(SimulatedFocusPlatform::new());
    let settings = FocusSettings {
        duration_hint: DurationHint::TransientMayDuck,
        ..FocusSettings::default()
    };
    let arbitrator = FocusArbitrator::new(platform.clone(), settings);
    let listener: Arc<dyn FocusListener> = Arc::new(Silent);

    assert!(arbitrator.request_focus(&claim(&listener, false)).await);
    assert_eq!(platform.last_hint(), Some(DurationHint::TransientMayDuck));
    assert_eq!(arbitrator.duration_hint(), DurationHint::TransientMayDuck);
}

#[tokio::test]
async fn test_independent_arbitrators_do_not_interact() {
    let first = TestRig::new();
    let second = TestRig::new();
    let a = first.player();
    let b = second.player();
    a.load(LoadRequest::new(TRACK)).await.unwrap();
    b.load(LoadRequest::new(TRACK)).await.unwrap();

    a.play().await.unwrap();
    b.play().await.unwrap();
    assert!(a.is_playing().await);
    assert!(b.is_playing().await);
}

#[tokio::test]
async fn test_concurrent_exclusive_requests_grant_one() {
    let rig = TestRig::new();
    let mut players = Vec::new();
    for _ in 0..8 {
        let player = rig.player();
        player.load(LoadRequest::new(TRACK)).await.unwrap();
        players.push(player);
    }

    let attempts: Vec<_> = players
        .iter()
        .cloned()
        .map(|player| tokio::spawn(async move { player.play().await }))
        .collect();

    let mut granted = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => granted += 1,
            Err(err) => assert_eq!(err, PlaybackError::FocusDenied),
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(rig.arbitrator.holders().await.len(), 1);
    assert_eq!(rig.platform.request_count(), 1);
}

#[tokio::test]
async fn test_registry_invariant_under_mixed_operations() {
    let platform = Arc::new(SimulatedFocusPlatform::new());
    let arbitrator = FocusArbitrator::new(platform.clone(), FocusSettings::default());
    let listener: Arc<dyn FocusListener> = Arc::new(Silent);
    let claims: Vec<FocusClaim> = (0..5).map(|i| claim(&listener, i % 2 == 0)).collect();

    // Deterministic LCG so failures reproduce
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    for step in 0..500 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let target = &claims[(seed >> 33) as usize % claims.len()];
        match (seed >> 20) % 3 {
            0 => arbitrator.register(target).await,
            1 => {
                arbitrator.request_focus(target).await;
            }
            _ => arbitrator.abandon_focus(target.id).await,
        }

        let registered: HashSet<_> = arbitrator.registered().await.into_iter().collect();
        let holders: HashSet<_> = arbitrator.holders().await.into_iter().collect();
        assert!(holders.is_subset(&registered), "holders escaped registry at step {step}");
        assert_eq!(
            arbitrator.has_session().await,
            platform.has_active_session(),
            "session bookkeeping diverged at step {step}"
        );
        if registered.is_empty() {
            assert!(!platform.has_active_session(), "session leaked at step {step}");
        }
    }
}

#[tokio::test]
async fn test_dropped_player_is_pruned_on_focus_change() {
    let platform = Arc::new(SimulatedFocusPlatform::new());
    let arbitrator = FocusArbitrator::new(platform.clone(), FocusSettings::default());
    let listener: Arc<dyn FocusListener> = Arc::new(Silent);
    let dropped = claim(&listener, false);
    let weak: Weak<dyn FocusListener> = Arc::downgrade(&listener);

    assert!(arbitrator.request_focus(&dropped).await);
    drop(listener);
    assert!(weak.upgrade().is_none());

    assert!(platform.emit(FocusChangeKind::Loss));
    helpers::settle().await;

    assert!(!arbitrator.is_registered(dropped.id).await);
    assert!(!platform.has_active_session());
}

#[tokio::test]
async fn test_dropped_player_does_not_block_scope() {
    let rig = TestRig::new();
    let first = rig.player();
    let second = rig.player();
    first.load(LoadRequest::new(TRACK)).await.unwrap();
    second.load(LoadRequest::new(OTHER_TRACK)).await.unwrap();
    first.play().await.unwrap();
    let first_id = first.id();

    // Every handle gone, no dispose
    drop(first);
    assert!(!rig.track(TRACK).is_running());

    second.play().await.unwrap();
    assert!(second.is_playing().await);
    assert_eq!(rig.arbitrator.holders().await, vec![second.id()]);
    assert!(!rig.arbitrator.is_registered(first_id).await);
    assert_eq!(rig.platform.release_count(), 1);
}
