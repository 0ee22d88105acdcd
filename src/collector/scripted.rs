//! In-memory collector driven by the caller.
//!
//! Used by tests and by `focus-fee` dry runs to feed the tracker a desktop
//! state without touching the OS.

use crate::collector::types::{
    CollectorError, WindowDescriptor, WindowSnapshot, WindowSnapshotProvider,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns whatever snapshot was last set, or an error while failures are queued.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    current: Mutex<WindowSnapshot>,
    pending_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(snapshot: WindowSnapshot) -> Self {
        Self {
            current: Mutex::new(snapshot),
            pending_failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the desktop with a single focused window.
    pub fn focus(&self, title: &str, owner: Option<&str>) {
        self.set(WindowSnapshot::from_ordered(vec![WindowDescriptor::new(
            title, owner,
        )]));
    }

    /// Replace the desktop state returned by the next polls.
    pub fn set(&self, snapshot: WindowSnapshot) {
        if let Ok(mut current) = self.current.lock() {
            *current = snapshot;
        }
    }

    /// Make the next `count` polls fail.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.fetch_add(count, Ordering::SeqCst);
    }

    /// Number of snapshot requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WindowSnapshotProvider for ScriptedProvider {
    fn snapshot(&self) -> Result<WindowSnapshot, CollectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CollectorError::Unavailable("scripted failure".to_string()));
        }

        self.current
            .lock()
            .map(|snapshot| snapshot.clone())
            .map_err(|e| CollectorError::Platform(e.to_string()))
    }
}
