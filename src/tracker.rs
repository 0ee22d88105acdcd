//! The poll loop and its control surface.
//!
//! `FeeTracker` owns the session behind one async mutex. A background task
//! polls the window snapshot provider on a fixed interval, classifies the
//! snapshot, debounces it and accrues the fee. Control calls (start, pause,
//! resume, stop, blacklist changes) take the same lock, so a tick never sees
//! a half-applied change.

use crate::collector::{WindowSnapshot, WindowSnapshotProvider};
use crate::core::{
    classify_snapshot, normalize_blacklist, Session, SessionState, DEFAULT_FEE_PER_MINUTE,
    DEFAULT_SELF_MARKERS,
};
use crate::settings::{Settings, SettingsStore};
use crate::stats::SharedUsageStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const TICK_CHANNEL_CAPACITY: usize = 100;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Tracker settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Time between polls
    pub poll_interval: Duration,
    /// Rate used when a start request carries an unusable one
    pub default_fee_per_minute: f64,
    /// Fragments identifying our own windows
    pub self_markers: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            default_fee_per_minute: DEFAULT_FEE_PER_MINUTE,
            self_markers: DEFAULT_SELF_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&crate::config::Config> for TrackerConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            default_fee_per_minute: config.fee_per_minute,
            self_markers: config.self_markers.clone(),
        }
    }
}

/// Published once per poll while a session is running or paused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickUpdate {
    pub distracted: bool,
    pub cents_owed: u64,
    /// Focused window title, empty when nothing has focus
    pub active_title: String,
    /// Titles of every open window, front to back
    pub active_titles: Vec<String>,
    /// Focused window owner, empty when unknown
    pub active_owner: String,
    pub blacklist: Vec<String>,
    pub paused: bool,
}

/// Outcome of start/pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResult {
    pub ok: bool,
}

/// Outcome of stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResult {
    pub cents_owed: u64,
}

/// Outcome of a blacklist change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistResult {
    pub ok: bool,
    pub blacklist: Vec<String>,
}

struct TrackerInner {
    session: Session,
    self_markers: Vec<String>,
}

/// Handle to the focus session and its poll loop. Cheap to clone.
#[derive(Clone)]
pub struct FeeTracker {
    inner: Arc<Mutex<TrackerInner>>,
    provider: Arc<dyn WindowSnapshotProvider>,
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    stats: Option<SharedUsageStats>,
    tick_tx: broadcast::Sender<TickUpdate>,
    poll_interval: Duration,
    default_fee_per_minute: f64,
    shutdown: Arc<AtomicBool>,
}

impl FeeTracker {
    /// Create a stopped tracker. The blacklist is loaded from `store`.
    pub fn new(
        provider: Arc<dyn WindowSnapshotProvider>,
        store: Arc<dyn SettingsStore>,
        config: TrackerConfig,
    ) -> Self {
        Self::with_clock(provider, store, config, Arc::new(SystemClock))
    }

    /// Create a stopped tracker reading time from `clock`.
    pub fn with_clock(
        provider: Arc<dyn WindowSnapshotProvider>,
        store: Arc<dyn SettingsStore>,
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = store.load_or_default();
        let default_fee_per_minute = if config.default_fee_per_minute.is_finite()
            && config.default_fee_per_minute > 0.0
        {
            config.default_fee_per_minute
        } else {
            DEFAULT_FEE_PER_MINUTE
        };
        let session = Session::new(settings.blacklist, default_fee_per_minute, clock.now());
        let (tick_tx, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                session,
                self_markers: normalize_blacklist(config.self_markers),
            })),
            provider,
            store,
            clock,
            stats: None,
            tick_tx,
            poll_interval: config.poll_interval,
            default_fee_per_minute,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record usage counters into `stats`.
    pub fn with_stats(mut self, stats: SharedUsageStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Spawn the poll loop on the current tokio runtime.
    ///
    /// The loop runs until `shutdown` is called. Polls never overlap; a poll
    /// that overruns the interval causes the missed ticks to be skipped.
    pub fn spawn(&self) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::debug!("Poll loop started ({:?} interval)", tracker.poll_interval);
            while !tracker.shutdown.load(Ordering::SeqCst) {
                ticker.tick().await;
                if tracker.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                tracker.poll_once().await;
            }
            tracing::debug!("Poll loop stopped");
        })
    }

    /// Ask the poll loop to exit after its current iteration.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Run one poll cycle.
    ///
    /// Returns the published update, or `None` when no session exists or the
    /// window list could not be read. A failed read abandons the tick
    /// entirely, so the next successful one charges the whole gap.
    pub async fn poll_once(&self) -> Option<TickUpdate> {
        if self.inner.lock().await.session.state() == SessionState::Stopped {
            return None;
        }

        let snapshot = match self.read_snapshot().await {
            Some(snapshot) => snapshot,
            None => {
                if let Some(stats) = &self.stats {
                    stats.record_failed_read();
                }
                return None;
            }
        };

        let update = {
            let mut inner = self.inner.lock().await;
            let raw = match inner.session.state() {
                SessionState::Stopped => return None,
                SessionState::Paused => false,
                SessionState::Running => classify_snapshot(
                    &snapshot,
                    inner.session.blacklist(),
                    inner.self_markers.as_slice(),
                ),
            };

            let accrual = inner.session.tick(raw, self.clock.now());
            if accrual.charged > 0 {
                tracing::debug!(
                    session = %inner.session.id(),
                    "Charged {} cents (total {})",
                    accrual.charged,
                    inner.session.cents_owed()
                );
            }

            let paused = inner.session.is_paused();
            if !paused {
                if let Some(stats) = &self.stats {
                    stats.record_tick(accrual.distracted);
                }
            }

            TickUpdate {
                distracted: accrual.distracted,
                cents_owed: inner.session.cents_owed(),
                active_title: snapshot
                    .active
                    .as_ref()
                    .map(|w| w.title.clone())
                    .unwrap_or_default(),
                active_titles: snapshot.titles(),
                active_owner: snapshot
                    .active
                    .as_ref()
                    .map(|w| w.owner().to_string())
                    .unwrap_or_default(),
                blacklist: inner.session.blacklist().to_vec(),
                paused,
            }
        };

        // No subscribers is fine.
        let _ = self.tick_tx.send(update.clone());
        Some(update)
    }

    async fn read_snapshot(&self) -> Option<WindowSnapshot> {
        let provider = Arc::clone(&self.provider);
        match tokio::task::spawn_blocking(move || provider.snapshot()).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(e)) => {
                tracing::warn!("Window snapshot failed, skipping tick: {e}");
                None
            }
            Err(e) => {
                tracing::warn!("Window snapshot task failed, skipping tick: {e}");
                None
            }
        }
    }

    /// Start a new session, discarding any previous total.
    ///
    /// A non-finite or non-positive rate is replaced by the configured default.
    pub async fn start(&self, blacklist: Vec<String>, fee_per_minute: f64) -> ControlResult {
        let fee_per_minute = if fee_per_minute.is_finite() && fee_per_minute > 0.0 {
            fee_per_minute
        } else {
            tracing::warn!(
                "Ignoring fee rate {fee_per_minute}, using {}",
                self.default_fee_per_minute
            );
            self.default_fee_per_minute
        };

        let mut inner = self.inner.lock().await;
        let ok = inner.session.start(blacklist, fee_per_minute, self.clock.now());
        if ok {
            tracing::info!(
                session = %inner.session.id(),
                "Session started at ${:.2}/min, blacklist: {:?}",
                inner.session.fee_per_minute(),
                inner.session.blacklist()
            );
        } else {
            tracing::debug!("Start ignored, session already {:?}", inner.session.state());
        }
        ControlResult { ok }
    }

    pub async fn pause(&self) -> ControlResult {
        let mut inner = self.inner.lock().await;
        let ok = inner.session.pause();
        if ok {
            tracing::info!(session = %inner.session.id(), "Session paused");
        }
        ControlResult { ok }
    }

    pub async fn resume(&self) -> ControlResult {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let ok = inner.session.resume(now);
        if ok {
            tracing::info!(session = %inner.session.id(), "Session resumed");
        }
        ControlResult { ok }
    }

    /// Stop the session and return what is owed.
    pub async fn stop(&self) -> StopResult {
        let mut inner = self.inner.lock().await;
        let was_active = inner.session.is_running();
        let cents_owed = inner.session.stop();

        if was_active {
            tracing::info!(
                session = %inner.session.id(),
                "Session stopped, {cents_owed} cents owed"
            );
            if let Some(stats) = &self.stats {
                stats.record_session_completed(cents_owed);
                if let Err(e) = stats.save() {
                    tracing::warn!("Could not save usage stats: {e}");
                }
            }
        }
        StopResult { cents_owed }
    }

    pub async fn get_settings(&self) -> Settings {
        Settings {
            blacklist: self.inner.lock().await.session.blacklist().to_vec(),
        }
    }

    /// Replace the blacklist. Takes effect on the next poll and is persisted.
    pub async fn set_blacklist(&self, blacklist: Vec<String>) -> BlacklistResult {
        let blacklist = {
            let mut inner = self.inner.lock().await;
            inner.session.set_blacklist(blacklist).to_vec()
        };

        self.store.save_quietly(&Settings {
            blacklist: blacklist.clone(),
        });
        BlacklistResult {
            ok: true,
            blacklist,
        }
    }

    /// Receive an update per poll.
    pub fn subscribe(&self) -> broadcast::Receiver<TickUpdate> {
        self.tick_tx.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.session.state()
    }

    pub async fn cents_owed(&self) -> u64 {
        self.inner.lock().await.session.cents_owed()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScriptedProvider;
    use crate::settings::MemoryStore;

    fn setup() -> (FeeTracker, Arc<ScriptedProvider>, Arc<ManualClock>) {
        let provider = Arc::new(ScriptedProvider::default());
        let clock = Arc::new(ManualClock::default());
        let tracker = FeeTracker::with_clock(
            provider.clone(),
            Arc::new(MemoryStore::default()),
            TrackerConfig::default(),
            clock.clone(),
        );
        (tracker, provider, clock)
    }

    #[tokio::test]
    async fn test_stopped_tracker_does_not_poll() {
        let (tracker, provider, _) = setup();
        assert!(tracker.poll_once().await.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_distracted_poll_accrues() {
        let (tracker, provider, clock) = setup();
        provider.focus("Funny cats - YouTube", Some("Google Chrome"));

        assert!(tracker.start(vec!["youtube".into()], 0.25).await.ok);
        clock.advance(chrono::Duration::seconds(60));

        let update = tracker.poll_once().await.unwrap();
        assert!(update.distracted);
        assert_eq!(update.cents_owed, 25);
        assert_eq!(update.active_title, "Funny cats - YouTube");
        assert_eq!(update.active_owner, "Google Chrome");
        assert!(!update.paused);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (tracker, _, _) = setup();
        assert!(tracker.start(vec![], 0.25).await.ok);
        assert!(!tracker.start(vec![], 0.25).await.ok);
    }

    #[tokio::test]
    async fn test_invalid_rate_uses_configured_default() {
        let (tracker, provider, clock) = setup();
        provider.focus("steam", None);

        tracker.start(vec!["steam".into()], f64::NAN).await;
        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(tracker.poll_once().await.unwrap().cents_owed, 25);
    }

    #[tokio::test]
    async fn test_failed_read_abandons_tick() {
        let (tracker, provider, clock) = setup();
        provider.focus("YouTube", None);
        tracker.start(vec!["youtube".into()], 0.25).await;

        provider.fail_next(1);
        clock.advance(chrono::Duration::seconds(60));
        assert!(tracker.poll_once().await.is_none());
        assert_eq!(tracker.cents_owed().await, 0);

        // The gap is charged on the next successful read.
        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(tracker.poll_once().await.unwrap().cents_owed, 50);
    }

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let (tracker, provider, _) = setup();
        let mut rx = tracker.subscribe();
        provider.focus("editor", Some("code"));
        tracker.start(vec!["youtube".into()], 0.25).await;

        tracker.poll_once().await;
        let update = rx.recv().await.unwrap();
        assert!(!update.distracted);
        assert_eq!(update.blacklist, vec!["youtube"]);
    }

    #[test]
    fn test_tick_update_is_camel_case() {
        let update = TickUpdate {
            distracted: true,
            cents_owed: 3,
            active_title: "t".into(),
            active_titles: vec!["t".into()],
            active_owner: String::new(),
            blacklist: vec![],
            paused: false,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["centsOwed"], 3);
        assert_eq!(json["activeTitles"][0], "t");
        assert_eq!(json["activeOwner"], "");
    }

    #[tokio::test]
    async fn test_empty_desktop_reports_empty_strings() {
        let (tracker, provider, _) = setup();
        provider.set(WindowSnapshot::default());
        tracker.start(vec!["youtube".into()], 0.25).await;

        let update = tracker.poll_once().await.unwrap();
        assert_eq!(update.active_title, "");
        assert_eq!(update.active_owner, "");
        assert!(update.active_titles.is_empty());

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["activeTitle"], "");
    }
}
