//! Raw distraction signal for a single poll.

use crate::collector::{WindowDescriptor, WindowSnapshot};
use crate::core::blacklist::{is_self, matches};

/// Decide whether this poll counts as distracted, before debouncing.
///
/// A blacklisted window only counts when it has focus, or when it sits
/// directly behind the focused window (side by side) while a blacklisted
/// window is confirmed open. Focus Fee's own windows are ignored in every
/// position, so a terminal titled `focus-fee run --blacklist youtube` never
/// counts.
pub fn classify<S: AsRef<str>>(
    active: Option<&WindowDescriptor>,
    second: Option<&WindowDescriptor>,
    open: &[WindowDescriptor],
    terms: &[S],
    self_markers: &[S],
) -> bool {
    if is_self(active, self_markers) {
        return false;
    }

    let second = second.filter(|w| !is_self(Some(*w), self_markers));

    let active_matches = matches(active, terms);
    let second_matches = second.is_some() && matches(second, terms);
    let any_blacklisted_open = open
        .iter()
        .filter(|w| !is_self(Some(*w), self_markers))
        .any(|w| matches(Some(w), terms));

    active_matches || (second_matches && any_blacklisted_open)
}

/// Convenience wrapper over a full snapshot.
pub fn classify_snapshot<S: AsRef<str>>(
    snapshot: &WindowSnapshot,
    terms: &[S],
    self_markers: &[S],
) -> bool {
    classify(
        snapshot.active.as_ref(),
        snapshot.second.as_ref(),
        &snapshot.open,
        terms,
        self_markers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blacklist::DEFAULT_SELF_MARKERS;

    const TERMS: &[&str] = &["youtube", "steam"];

    fn w(title: &str, owner: &str) -> WindowDescriptor {
        WindowDescriptor::new(title, Some(owner))
    }

    #[test]
    fn test_focused_blacklisted_window_is_distracting() {
        let snapshot = WindowSnapshot::from_ordered(vec![w("YouTube", "Chrome"), w("notes", "vim")]);
        assert!(classify_snapshot(&snapshot, TERMS, DEFAULT_SELF_MARKERS));
    }

    #[test]
    fn test_minimized_blacklisted_app_is_not_distracting() {
        // Steam is open but neither focused nor next in line.
        let snapshot = WindowSnapshot::from_ordered(vec![
            w("main.rs", "code"),
            w("Terminal", "alacritty"),
            w("Steam", "steam"),
        ]);
        assert!(!classify_snapshot(&snapshot, TERMS, DEFAULT_SELF_MARKERS));
    }

    #[test]
    fn test_side_by_side_blacklisted_window_is_distracting() {
        let snapshot = WindowSnapshot::from_ordered(vec![w("main.rs", "code"), w("YouTube", "Chrome")]);
        assert!(classify_snapshot(&snapshot, TERMS, DEFAULT_SELF_MARKERS));
    }

    #[test]
    fn test_blacklisted_window_behind_maximized_editor_is_not_distracting() {
        use crate::collector::WindowBounds;

        let snapshot = WindowSnapshot::from_layered(vec![
            (w("main.rs", "code"), Some(WindowBounds::new(0.0, 0.0, 1920.0, 1080.0))),
            (w("YouTube", "Chrome"), Some(WindowBounds::new(200.0, 150.0, 1280.0, 720.0))),
        ]);
        assert!(!classify_snapshot(&snapshot, TERMS, DEFAULT_SELF_MARKERS));
    }

    #[test]
    fn test_second_window_requires_confirmation_in_open_set() {
        // The provider reported a second window that is absent from the open list.
        let active = w("main.rs", "code");
        let second = w("YouTube", "Chrome");
        assert!(!classify(
            Some(&active),
            Some(&second),
            &[active.clone()],
            TERMS,
            DEFAULT_SELF_MARKERS
        ));
    }

    #[test]
    fn test_self_window_never_distracting() {
        // Even a blacklist that names the app itself cannot flag it.
        let terms = ["focus", "youtube"];
        let markers = ["focus-fee", "focus fee"];
        let snapshot = WindowSnapshot::from_ordered(vec![
            w("Focus Fee - YouTube stats", "focus-fee"),
            w("YouTube", "Chrome"),
        ]);
        assert!(!classify_snapshot(&snapshot, &terms, &markers));
    }

    #[test]
    fn test_own_terminal_behind_editor_is_not_distracting() {
        let editor = w("main.rs - project", "Code");
        let terminal = w("focus-fee run --blacklist youtube", "Terminal");
        let open = vec![editor.clone(), terminal.clone()];
        let terms = ["youtube"];

        assert!(!classify(
            Some(&editor),
            Some(&terminal),
            &open,
            &terms,
            DEFAULT_SELF_MARKERS
        ));
        let snapshot = WindowSnapshot::from_ordered(open);
        assert!(!classify_snapshot(&snapshot, &terms, DEFAULT_SELF_MARKERS));
    }

    #[test]
    fn test_own_window_does_not_confirm_second() {
        // The only other blacklisted match in the open set is our own window.
        let editor = w("main.rs", "code");
        let second = w("YouTube", "Chrome");
        let ours = w("focus fee: youtube blocked", "focus-fee");
        assert!(!classify(
            Some(&editor),
            Some(&second),
            &[editor.clone(), ours],
            TERMS,
            DEFAULT_SELF_MARKERS
        ));
    }

    #[test]
    fn test_no_windows() {
        let snapshot = WindowSnapshot::default();
        assert!(!classify_snapshot(&snapshot, TERMS, DEFAULT_SELF_MARKERS));
    }
}
