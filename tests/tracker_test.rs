//! Integration tests for the fee tracker control surface

use chrono::Duration;
use focus_fee::collector::{ScriptedProvider, WindowDescriptor, WindowSnapshot};
use focus_fee::settings::{JsonFileStore, MemoryStore, SettingsStore};
use focus_fee::stats::UsageStats;
use focus_fee::tracker::{FeeTracker, ManualClock, TrackerConfig};
use focus_fee::SessionState;
use std::sync::Arc;

fn tracker_with(
    store: Arc<dyn SettingsStore>,
) -> (FeeTracker, Arc<ScriptedProvider>, Arc<ManualClock>) {
    let provider = Arc::new(ScriptedProvider::default());
    let clock = Arc::new(ManualClock::default());
    let tracker = FeeTracker::with_clock(
        provider.clone(),
        store,
        TrackerConfig::default(),
        clock.clone(),
    );
    (tracker, provider, clock)
}

fn tracker() -> (FeeTracker, Arc<ScriptedProvider>, Arc<ManualClock>) {
    tracker_with(Arc::new(MemoryStore::default()))
}

/// Advance the clock in 12 second steps, polling after each.
async fn poll_for(tracker: &FeeTracker, clock: &ManualClock, seconds: i64) {
    for _ in 0..seconds / 12 {
        clock.advance(Duration::seconds(12));
        tracker.poll_once().await;
    }
}

#[tokio::test]
async fn test_two_minutes_of_youtube_costs_fifty_cents() {
    let (tracker, provider, clock) = tracker();
    provider.focus("lofi beats - YouTube - Google Chrome", Some("Google Chrome"));

    assert!(tracker.start(vec!["youtube".into()], 0.25).await.ok);
    poll_for(&tracker, &clock, 120).await;

    assert_eq!(tracker.stop().await.cents_owed, 50);
    assert_eq!(tracker.state().await, SessionState::Stopped);
}

#[tokio::test]
async fn test_paused_time_is_not_charged() {
    let (tracker, provider, clock) = tracker();
    provider.focus("YouTube", None);

    tracker.start(vec!["youtube".into()], 0.25).await;
    poll_for(&tracker, &clock, 60).await;
    assert_eq!(tracker.cents_owed().await, 25);

    assert!(tracker.pause().await.ok);
    poll_for(&tracker, &clock, 600).await;
    assert_eq!(tracker.cents_owed().await, 25);

    // Paused polls still publish, flagged as paused.
    let update = tracker.poll_once().await.unwrap();
    assert!(update.paused);
    assert_eq!(update.cents_owed, 25);

    assert!(tracker.resume().await.ok);
    poll_for(&tracker, &clock, 60).await;
    assert_eq!(tracker.stop().await.cents_owed, 50);
}

#[tokio::test]
async fn test_invalid_transitions_are_rejected() {
    let (tracker, _, _) = tracker();

    assert!(!tracker.pause().await.ok);
    assert!(!tracker.resume().await.ok);

    tracker.start(vec![], 0.25).await;
    assert!(!tracker.resume().await.ok);
    assert!(tracker.pause().await.ok);
    assert!(!tracker.pause().await.ok);
    assert!(!tracker.start(vec![], 0.25).await.ok);
}

#[tokio::test]
async fn test_stop_twice_returns_same_total() {
    let (tracker, provider, clock) = tracker();
    provider.focus("Steam", Some("steam"));

    tracker.start(vec!["steam".into()], 1.0).await;
    poll_for(&tracker, &clock, 60).await;

    let first = tracker.stop().await.cents_owed;
    assert_eq!(first, 100);
    assert_eq!(tracker.stop().await.cents_owed, first);
}

#[tokio::test]
async fn test_restart_resets_total() {
    let (tracker, provider, clock) = tracker();
    provider.focus("YouTube", None);

    tracker.start(vec!["youtube".into()], 0.25).await;
    poll_for(&tracker, &clock, 60).await;
    tracker.stop().await;

    tracker.start(vec!["youtube".into()], 0.25).await;
    assert_eq!(tracker.cents_owed().await, 0);
}

#[tokio::test]
async fn test_own_window_is_never_charged() {
    let (tracker, provider, clock) = tracker();
    // Our window title mentions a blacklisted site.
    provider.focus("Focus Fee - blocking youtube", Some("focus-fee"));

    tracker.start(vec!["youtube".into()], 0.25).await;
    poll_for(&tracker, &clock, 120).await;

    let update = tracker.poll_once().await.unwrap();
    assert!(!update.distracted);
    assert_eq!(tracker.stop().await.cents_owed, 0);
}

#[tokio::test]
async fn test_own_terminal_behind_editor_is_never_charged() {
    let (tracker, provider, clock) = tracker();
    // The terminal running the tracker carries the blacklist in its title.
    provider.set(WindowSnapshot::from_ordered(vec![
        WindowDescriptor::new("main.rs - project", Some("Code")),
        WindowDescriptor::new("focus-fee run --blacklist youtube", Some("Terminal")),
    ]));

    tracker.start(vec!["youtube".into()], 0.25).await;
    poll_for(&tracker, &clock, 120).await;

    assert!(!tracker.poll_once().await.unwrap().distracted);
    assert_eq!(tracker.stop().await.cents_owed, 0);
}

#[tokio::test]
async fn test_minimized_app_is_free_but_side_by_side_is_not() {
    let (tracker, provider, clock) = tracker();
    provider.set(WindowSnapshot::from_ordered(vec![
        WindowDescriptor::new("main.rs - project", Some("Code")),
        WindowDescriptor::new("Terminal", Some("Terminal")),
        WindowDescriptor::new("Steam", Some("steam")),
    ]));

    tracker.start(vec!["steam".into()], 0.25).await;
    poll_for(&tracker, &clock, 60).await;
    assert_eq!(tracker.cents_owed().await, 0);

    provider.set(WindowSnapshot::from_ordered(vec![
        WindowDescriptor::new("main.rs - project", Some("Code")),
        WindowDescriptor::new("Steam", Some("steam")),
    ]));
    poll_for(&tracker, &clock, 60).await;
    assert_eq!(tracker.cents_owed().await, 25);
}

#[tokio::test]
async fn test_leaving_distraction_needs_two_clean_polls() {
    let (tracker, provider, clock) = tracker();
    provider.focus("YouTube", None);
    tracker.start(vec!["youtube".into()], 0.25).await;

    clock.advance(Duration::seconds(12));
    assert!(tracker.poll_once().await.unwrap().distracted);

    provider.focus("notes", Some("vim"));
    clock.advance(Duration::seconds(12));
    let update = tracker.poll_once().await.unwrap();
    assert!(update.distracted);
    assert_eq!(update.cents_owed, 10);

    clock.advance(Duration::seconds(12));
    let update = tracker.poll_once().await.unwrap();
    assert!(!update.distracted);
    assert_eq!(update.cents_owed, 10);
}

#[tokio::test]
async fn test_read_failures_do_not_stop_polling() {
    let (tracker, provider, clock) = tracker();
    let stats = Arc::new(UsageStats::new());
    let tracker = tracker.with_stats(stats.clone());
    provider.focus("YouTube", None);

    tracker.start(vec!["youtube".into()], 0.25).await;
    provider.fail_next(3);
    poll_for(&tracker, &clock, 36).await;
    assert_eq!(tracker.cents_owed().await, 0);

    clock.advance(Duration::seconds(24));
    assert!(tracker.poll_once().await.is_some());
    assert_eq!(tracker.cents_owed().await, 25);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.failed_reads, 3);
    assert_eq!(snapshot.ticks_observed, 1);
}

#[tokio::test]
async fn test_set_blacklist_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("settings.json")));
    let (tracker, _, _) = tracker_with(store.clone());

    // Nothing saved yet: built-in defaults.
    assert_eq!(
        tracker.get_settings().await.blacklist,
        vec!["youtube", "twitter", "instagram", "steam"]
    );

    let result = tracker
        .set_blacklist(vec![" Reddit ".into(), "TikTok".into(), "reddit".into(), "".into()])
        .await;
    assert!(result.ok);
    assert_eq!(result.blacklist, vec!["reddit", "tiktok"]);
    assert_eq!(tracker.get_settings().await.blacklist, vec!["reddit", "tiktok"]);

    // Persisted for the next tracker.
    let (reloaded, _, _) = tracker_with(store);
    assert_eq!(reloaded.get_settings().await.blacklist, vec!["reddit", "tiktok"]);
}

#[tokio::test]
async fn test_blacklist_change_applies_to_running_session() {
    let (tracker, provider, clock) = tracker();
    provider.focus("r/rust - Reddit", None);

    tracker.start(vec!["youtube".into()], 0.25).await;
    poll_for(&tracker, &clock, 60).await;
    assert_eq!(tracker.cents_owed().await, 0);

    tracker.set_blacklist(vec!["reddit".into()]).await;
    poll_for(&tracker, &clock, 60).await;
    assert_eq!(tracker.cents_owed().await, 25);
}

#[tokio::test]
async fn test_spawned_loop_publishes_ticks() {
    let provider = Arc::new(ScriptedProvider::default());
    provider.focus("YouTube", None);
    let config = TrackerConfig {
        poll_interval: std::time::Duration::from_millis(10),
        ..TrackerConfig::default()
    };
    let tracker = FeeTracker::new(provider.clone(), Arc::new(MemoryStore::default()), config);
    let mut rx = tracker.subscribe();

    tracker.start(vec!["youtube".into()], 0.25).await;
    let handle = tracker.spawn();

    let update = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("no tick within 5s")
        .unwrap();
    assert!(update.distracted);
    assert_eq!(update.active_title, "YouTube");

    tracker.shutdown();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("poll loop did not exit")
        .unwrap();
    assert!(provider.calls() >= 1);
}
