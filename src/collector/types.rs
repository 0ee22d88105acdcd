//! Window descriptors produced by the platform collectors.
//!
//! A descriptor carries only what the blacklist needs: the window title and
//! the name of the application that owns it. Nothing is kept between polls.

use serde::{Deserialize, Serialize};

/// A single top-level window as reported by the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDescriptor {
    /// Window title (may be empty when the OS withholds it)
    pub title: String,
    /// Name of the owning application or process
    pub owner_name: Option<String>,
}

impl WindowDescriptor {
    pub fn new(title: impl Into<String>, owner_name: Option<&str>) -> Self {
        Self {
            title: title.into(),
            owner_name: owner_name.map(str::to_string),
        }
    }

    /// Owner name or an empty string.
    pub fn owner(&self) -> &str {
        self.owner_name.as_deref().unwrap_or("")
    }
}

/// On-screen rectangle of a window, in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn covers(&self, other: &WindowBounds) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.x + self.width >= other.x + other.width
            && self.y + self.height >= other.y + other.height
    }
}

/// Everything one poll learns about the desktop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// The focused window
    pub active: Option<WindowDescriptor>,
    /// The window directly behind the focused one (split-screen case)
    pub second: Option<WindowDescriptor>,
    /// All open top-level windows
    pub open: Vec<WindowDescriptor>,
}

impl WindowSnapshot {
    /// Build a snapshot from a front-to-back ordered window list.
    ///
    /// The frontmost window is taken as the active one and the next window as
    /// the side-by-side candidate.
    pub fn from_ordered(open: Vec<WindowDescriptor>) -> Self {
        let second = open.get(1).cloned();
        Self::with_second(open, second)
    }

    /// Build a snapshot whose side-by-side candidate was chosen by the caller.
    pub fn with_second(open: Vec<WindowDescriptor>, second: Option<WindowDescriptor>) -> Self {
        Self {
            active: open.first().cloned(),
            second,
            open,
        }
    }

    /// Build a snapshot from a front-to-back list carrying window bounds.
    ///
    /// The side-by-side candidate is the frontmost window behind the active
    /// one that the active window does not fully cover. Windows without
    /// bounds (minimized, or not reported) are never candidates.
    pub fn from_layered(windows: Vec<(WindowDescriptor, Option<WindowBounds>)>) -> Self {
        let active_bounds = windows.first().and_then(|(_, bounds)| *bounds);
        let second = windows
            .iter()
            .skip(1)
            .find(|(_, bounds)| match (bounds, active_bounds) {
                (Some(bounds), Some(active)) => !active.covers(bounds),
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|(window, _)| window.clone());
        let open = windows.into_iter().map(|(window, _)| window).collect();
        Self::with_second(open, second)
    }

    /// Titles of every open window, in provider order.
    pub fn titles(&self) -> Vec<String> {
        self.open.iter().map(|w| w.title.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.open.is_empty()
    }
}

/// Source of window snapshots.
///
/// Implementations block on OS calls; the tracker runs them on the blocking
/// thread pool.
pub trait WindowSnapshotProvider: Send + Sync {
    fn snapshot(&self) -> Result<WindowSnapshot, CollectorError>;
}

/// Errors that can occur while reading the window list.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Window list unavailable: {0}")]
    Unavailable(String),
    #[error("Screen recording or accessibility permission not granted")]
    PermissionDenied,
    #[error("Platform error: {0}")]
    Platform(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ordered_picks_front_windows() {
        let snapshot = WindowSnapshot::from_ordered(vec![
            WindowDescriptor::new("YouTube - Firefox", Some("firefox")),
            WindowDescriptor::new("main.rs - editor", Some("code")),
            WindowDescriptor::new("Terminal", None),
        ]);

        assert_eq!(snapshot.active.as_ref().unwrap().title, "YouTube - Firefox");
        assert_eq!(snapshot.second.as_ref().unwrap().owner(), "code");
        assert_eq!(snapshot.open.len(), 3);
        assert_eq!(snapshot.titles()[2], "Terminal");
    }

    #[test]
    fn test_from_ordered_empty() {
        let snapshot = WindowSnapshot::from_ordered(Vec::new());
        assert!(snapshot.is_empty());
        assert!(snapshot.second.is_none());
    }

    #[test]
    fn test_covers() {
        let screen = WindowBounds::new(0.0, 0.0, 1920.0, 1080.0);
        let left = WindowBounds::new(0.0, 0.0, 960.0, 1080.0);
        let right = WindowBounds::new(960.0, 0.0, 960.0, 1080.0);

        assert!(screen.covers(&left));
        assert!(screen.covers(&screen));
        assert!(!left.covers(&right));
        assert!(!left.covers(&screen));
    }

    #[test]
    fn test_window_hidden_behind_maximized_is_not_second() {
        let screen = WindowBounds::new(0.0, 0.0, 1920.0, 1080.0);
        let snapshot = WindowSnapshot::from_layered(vec![
            (WindowDescriptor::new("main.rs", Some("Code")), Some(screen)),
            (
                WindowDescriptor::new("YouTube", Some("Google Chrome")),
                Some(WindowBounds::new(100.0, 100.0, 1200.0, 800.0)),
            ),
        ]);

        assert_eq!(snapshot.active.as_ref().unwrap().title, "main.rs");
        assert!(snapshot.second.is_none());
        assert_eq!(snapshot.open.len(), 2);
    }

    #[test]
    fn test_split_screen_skips_covered_windows() {
        let left = WindowBounds::new(0.0, 0.0, 960.0, 1080.0);
        let snapshot = WindowSnapshot::from_layered(vec![
            (WindowDescriptor::new("main.rs", Some("Code")), Some(left)),
            (
                WindowDescriptor::new("Terminal", Some("Terminal")),
                Some(WindowBounds::new(100.0, 100.0, 600.0, 400.0)),
            ),
            (WindowDescriptor::new("Steam", Some("steam")), None),
            (
                WindowDescriptor::new("YouTube", Some("Google Chrome")),
                Some(WindowBounds::new(960.0, 0.0, 960.0, 1080.0)),
            ),
        ]);

        assert_eq!(snapshot.second.as_ref().unwrap().title, "YouTube");
        assert_eq!(snapshot.open.len(), 4);
    }

    #[test]
    fn test_with_second_keeps_explicit_choice() {
        let open = vec![
            WindowDescriptor::new("main.rs", Some("code")),
            WindowDescriptor::new("YouTube", Some("firefox")),
        ];
        let snapshot = WindowSnapshot::with_second(open, None);
        assert_eq!(snapshot.active.as_ref().unwrap().owner(), "code");
        assert!(snapshot.second.is_none());
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let json = serde_json::to_value(WindowDescriptor::new("t", Some("o"))).unwrap();
        assert_eq!(json["ownerName"], "o");
    }
}
