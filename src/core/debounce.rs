//! Asymmetric debouncing of the raw distraction signal.
//!
//! Entering the distracted state is immediate so the fee starts with the
//! first reading. Leaving it requires two consecutive clean readings, so a
//! single flickering window read cannot stop the meter.

use serde::{Deserialize, Serialize};

/// Consecutive identical readings needed before leaving "distracted".
pub const EXIT_CONFIRMATIONS: u32 = 2;

/// The previous raw reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LastReading {
    /// No reading yet in this session
    #[default]
    Unknown,
    Value(bool),
}

/// Debouncer state, reset whenever a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebounceState {
    pub last_raw: LastReading,
    pub consecutive_same: u32,
    pub displayed: bool,
}

impl DebounceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw reading and return the displayed value.
    pub fn update(&mut self, raw: bool) -> bool {
        let (displayed, next) = debounce(raw, *self);
        *self = next;
        displayed
    }
}

/// Pure debounce step: `(displayed, new_state)` for a raw reading.
pub fn debounce(raw: bool, state: DebounceState) -> (bool, DebounceState) {
    let mut next = state;

    match state.last_raw {
        LastReading::Unknown => {
            next.consecutive_same = 1;
            next.displayed = raw;
        }
        LastReading::Value(last) if last == raw => {
            next.consecutive_same = state.consecutive_same.saturating_add(1);
            if next.consecutive_same >= EXIT_CONFIRMATIONS || raw {
                next.displayed = raw;
            }
        }
        LastReading::Value(_) => {
            next.consecutive_same = 1;
            if raw {
                next.displayed = true;
            }
        }
    }

    next.last_raw = LastReading::Value(raw);
    (next.displayed, next)
}
