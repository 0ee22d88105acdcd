//! Cumulative usage statistics.
//!
//! Counts polls, distractions and settlements across sessions so the user can
//! see lifetime totals. Only totals are kept; there is no per-session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Usage counters, safe to share between the poller and control handlers.
#[derive(Debug)]
pub struct UsageStats {
    /// Polls that produced a reading
    ticks_observed: AtomicU64,
    /// Polls displayed as distracted
    distracted_ticks: AtomicU64,
    /// Polls abandoned because the window list could not be read
    failed_reads: AtomicU64,
    /// Sessions stopped
    sessions_completed: AtomicU64,
    /// Cents accrued over all sessions
    cents_accrued: AtomicU64,
    /// Cents successfully settled to a wallet
    cents_settled: AtomicU64,
    /// When this process started counting
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self {
            ticks_observed: AtomicU64::new(0),
            distracted_ticks: AtomicU64::new(0),
            failed_reads: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            cents_accrued: AtomicU64::new(0),
            cents_settled: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that load from and save to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous usage stats: {e}");
        }

        stats
    }

    pub fn record_tick(&self, distracted: bool) {
        self.ticks_observed.fetch_add(1, Ordering::Relaxed);
        if distracted {
            self.distracted_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failed_read(&self) {
        self.failed_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_completed(&self, cents_owed: u64) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
        self.cents_accrued.fetch_add(cents_owed, Ordering::Relaxed);
    }

    pub fn record_settled(&self, cents: u64) {
        self.cents_settled.fetch_add(cents, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks_observed: self.ticks_observed.load(Ordering::Relaxed),
            distracted_ticks: self.distracted_ticks.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            cents_accrued: self.cents_accrued.load(Ordering::Relaxed),
            cents_settled: self.cents_settled.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Usage Statistics:\n\
             - Polls observed: {}\n\
             - Polls distracted: {}\n\
             - Failed window reads: {}\n\
             - Sessions completed: {}\n\
             - Fees accrued: {}\n\
             - Fees settled: {}",
            s.ticks_observed,
            s.distracted_ticks,
            s.failed_reads,
            s.sessions_completed,
            format_cents(s.cents_accrued),
            format_cents(s.cents_settled),
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let s = self.snapshot();
            let persisted = PersistedStats {
                ticks_observed: s.ticks_observed,
                distracted_ticks: s.distracted_ticks,
                failed_reads: s.failed_reads,
                sessions_completed: s.sessions_completed,
                cents_accrued: s.cents_accrued,
                cents_settled: s.cents_settled,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.ticks_observed
                    .store(persisted.ticks_observed, Ordering::Relaxed);
                self.distracted_ticks
                    .store(persisted.distracted_ticks, Ordering::Relaxed);
                self.failed_reads
                    .store(persisted.failed_reads, Ordering::Relaxed);
                self.sessions_completed
                    .store(persisted.sessions_completed, Ordering::Relaxed);
                self.cents_accrued
                    .store(persisted.cents_accrued, Ordering::Relaxed);
                self.cents_settled
                    .store(persisted.cents_settled, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for UsageStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ticks_observed: u64,
    pub distracted_ticks: u64,
    pub failed_reads: u64,
    pub sessions_completed: u64,
    pub cents_accrued: u64,
    pub cents_settled: u64,
    pub started_at: DateTime<Utc>,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    ticks_observed: u64,
    distracted_ticks: u64,
    failed_reads: u64,
    sessions_completed: u64,
    cents_accrued: u64,
    cents_settled: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared usage stats.
pub type SharedUsageStats = Arc<UsageStats>;

pub fn create_shared_stats() -> SharedUsageStats {
    Arc::new(UsageStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedUsageStats {
    Arc::new(UsageStats::with_persistence(path))
}

/// Format cents as dollars, e.g. `$1.05`.
pub fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}
