//! Core functionality for Focus Fee.
//!
//! This module contains:
//! - Blacklist matching with service name expansion
//! - The per-poll distraction classifier
//! - Asymmetric debouncing of the raw signal
//! - The session state machine and fee accrual

pub mod blacklist;
pub mod classifier;
pub mod debounce;
pub mod session;

// Re-export commonly used types
pub use blacklist::{
    default_blacklist, expand_term, is_self, matches, normalize_blacklist, DEFAULT_BLACKLIST,
    DEFAULT_SELF_MARKERS,
};
pub use classifier::{classify, classify_snapshot};
pub use debounce::{debounce, DebounceState, LastReading};
pub use session::{charge_for, Accrual, Session, SessionState, DEFAULT_FEE_PER_MINUTE};
