//! Fallback collector for platforms without window enumeration.
//!
//! This exists so the crate (and binary) can compile on targets where no
//! native window list is wired up. It always reports an empty desktop, so a
//! session on such a platform never accrues a fee.

use crate::collector::types::{CollectorError, WindowSnapshot, WindowSnapshotProvider};

/// A collector that never sees any windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCollector;

impl NoopCollector {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSnapshotProvider for NoopCollector {
    fn snapshot(&self) -> Result<WindowSnapshot, CollectorError> {
        Ok(WindowSnapshot::default())
    }
}

/// There is no permission gate when nothing is read.
pub fn check_permission() -> bool {
    true
}
