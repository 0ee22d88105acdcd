//! Focus Fee - charge yourself for getting distracted.
//!
//! This library watches the foreground window, decides whether it belongs to a
//! blacklisted application or site, and accrues a per-minute "focus fee" while
//! the user is distracted. When a session ends, the accrued amount is handed
//! to a payment endpoint that transfers the SOL equivalent to a wallet.
//!
//! # Billing Rules
//!
//! - **Focused window only**: a blacklisted app that is merely open costs nothing
//! - **Immediate entry**: the fee starts on the first distracted reading
//! - **Confirmed exit**: leaving a distraction needs two consecutive clean readings
//! - **Rounded up**: each tick charges the ceiling of the elapsed fee in cents
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Focus Fee                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Collector  │──▶│  Blacklist  │──▶│ Classifier  │        │
//! │  │  (windows)  │   │  (matcher)  │   │   (raw)     │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                                             │                │
//! │                                             ▼                │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │ Settlement  │◀──│   Session   │◀──│  Debouncer  │        │
//! │  │  (payment)  │   │  (accrual)  │   │ (displayed) │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use focus_fee::{collector, settings::MemoryStore, tracker::{FeeTracker, TrackerConfig}};
//!
//! # async fn demo() {
//! let provider = Arc::new(collector::Collector::new());
//! let tracker = FeeTracker::new(provider, Arc::new(MemoryStore::default()), TrackerConfig::default());
//! let _poller = tracker.spawn();
//!
//! tracker.start(vec!["youtube".into()], 0.25).await;
//! // ... later
//! let owed = tracker.stop().await;
//! println!("owed {} cents", owed.cents_owed);
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod payment;
pub mod settings;
pub mod settlement;
pub mod stats;
pub mod tracker;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{Collector, CollectorError, WindowDescriptor, WindowSnapshot, WindowSnapshotProvider};
pub use config::{Config, ConfigError};
pub use crate::core::{classify, debounce, matches, DebounceState, Session, SessionState};
pub use settings::{JsonFileStore, MemoryStore, Settings, SettingsStore};
pub use settlement::{PaymentClient, SettlementError, SettlementHandoff, SettlementResult};
pub use stats::{SharedUsageStats, UsageStats};
pub use tracker::{FeeTracker, TickUpdate, TrackerConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Billing disclosure that can be displayed to users.
pub const FEE_DISCLOSURE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 FOCUS FEE - BILLING DISCLOSURE                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  While a session runs, the focused window is checked every       ║
║  1.5 seconds against your blacklist.                             ║
║                                                                  ║
║  ✓ YOU ARE CHARGED WHEN:                                         ║
║    • A blacklisted app or site is the focused window             ║
║    • It is side by side with your work while still open          ║
║                                                                  ║
║  ✗ YOU ARE NEVER CHARGED FOR:                                    ║
║    • Blacklisted apps that are open but minimized                ║
║    • Time spent while the session is paused                      ║
║    • Focus Fee's own window                                      ║
║                                                                  ║
║  Each check rounds the fee UP to the next cent. When you stop,   ║
║  the total is sent to the payment endpoint and converted to SOL. ║
║                                                                  ║
║  See your lifetime totals anytime with:                          ║
║    focus-fee status                                              ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
