//! Session state machine and fee accrual.
//!
//! A session moves between `Stopped`, `Running` and `Paused`. Each poll feeds
//! the raw distraction reading through the debouncer and, while running,
//! charges the elapsed time since the previous poll at the session's rate.

use crate::core::blacklist::normalize_blacklist;
use crate::core::debounce::DebounceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fee rate used when none (or an unusable one) is supplied, in dollars per minute.
pub const DEFAULT_FEE_PER_MINUTE: f64 = 0.25;

/// Distance from a whole cent that still counts as exactly that cent.
const CEIL_TOLERANCE: f64 = 1e-9;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Result of one accrual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    /// Debounced distraction state after this reading
    pub distracted: bool,
    /// Cents added by this reading
    pub charged: u64,
}

/// The focus session.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    blacklist: Vec<String>,
    fee_per_minute: f64,
    cents_owed: u64,
    last_check: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    debounce: DebounceState,
}

impl Session {
    /// A stopped session holding the given settings.
    pub fn new(blacklist: Vec<String>, fee_per_minute: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Stopped,
            blacklist: normalize_blacklist(blacklist),
            fee_per_minute: valid_rate(fee_per_minute).unwrap_or(DEFAULT_FEE_PER_MINUTE),
            cents_owed: 0,
            last_check: now,
            started_at: None,
            debounce: DebounceState::new(),
        }
    }

    /// Begin a new session, discarding the previous total.
    ///
    /// An unusable fee rate keeps the previous rate. Returns false if a
    /// session is already running or paused.
    pub fn start(&mut self, blacklist: Vec<String>, fee_per_minute: f64, now: DateTime<Utc>) -> bool {
        if self.state != SessionState::Stopped {
            return false;
        }

        self.id = Uuid::new_v4();
        self.blacklist = normalize_blacklist(blacklist);
        if let Some(rate) = valid_rate(fee_per_minute) {
            self.fee_per_minute = rate;
        }
        self.cents_owed = 0;
        self.last_check = now;
        self.started_at = Some(now);
        self.debounce = DebounceState::new();
        self.state = SessionState::Running;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.state = SessionState::Paused;
        true
    }

    /// Resume accrual. The paused interval is never charged.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != SessionState::Paused {
            return false;
        }
        self.last_check = now;
        self.state = SessionState::Running;
        true
    }

    /// End the session and return the amount owed.
    ///
    /// Blacklist and rate are kept for the next start. Stopping an already
    /// stopped session returns the last total unchanged.
    pub fn stop(&mut self) -> u64 {
        self.state = SessionState::Stopped;
        self.cents_owed
    }

    /// Feed one raw reading taken at `now`.
    ///
    /// Only a running session consumes the reading; otherwise nothing changes
    /// and the current displayed state is reported.
    pub fn tick(&mut self, raw_distracted: bool, now: DateTime<Utc>) -> Accrual {
        if self.state != SessionState::Running {
            return Accrual {
                distracted: self.state == SessionState::Paused && self.debounce.displayed,
                charged: 0,
            };
        }

        let distracted = self.debounce.update(raw_distracted);
        let elapsed_ms = (now - self.last_check).num_milliseconds().max(0);

        let charged = if distracted {
            charge_for(elapsed_ms, self.fee_per_minute)
        } else {
            0
        };
        self.cents_owed = self.cents_owed.saturating_add(charged);
        self.last_check = now;

        Accrual { distracted, charged }
    }

    /// Replace the blacklist; applies from the next reading.
    pub fn set_blacklist(&mut self, blacklist: Vec<String>) -> &[String] {
        self.blacklist = normalize_blacklist(blacklist);
        &self.blacklist
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != SessionState::Stopped
    }

    pub fn is_paused(&self) -> bool {
        self.state == SessionState::Paused
    }

    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    pub fn fee_per_minute(&self) -> f64 {
        self.fee_per_minute
    }

    pub fn cents_owed(&self) -> u64 {
        self.cents_owed
    }

    pub fn last_check(&self) -> DateTime<Utc> {
        self.last_check
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn displayed_distracted(&self) -> bool {
        self.debounce.displayed
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.debounce
    }
}

/// Cents charged for `elapsed_ms` of distraction at `fee_per_minute` dollars.
///
/// Always rounds up to the next whole cent.
pub fn charge_for(elapsed_ms: i64, fee_per_minute: f64) -> u64 {
    if elapsed_ms <= 0 || fee_per_minute.is_nan() || fee_per_minute <= 0.0 {
        return 0;
    }
    let cents = elapsed_ms as f64 / MS_PER_MINUTE * fee_per_minute * 100.0;
    let whole = cents.round();
    let cents = if (cents - whole).abs() < CEIL_TOLERANCE {
        whole
    } else {
        cents.ceil()
    };
    cents.max(0.0) as u64
}

fn valid_rate(rate: f64) -> Option<f64> {
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
