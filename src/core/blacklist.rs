//! Blacklist matching against window titles and owner names.
//!
//! User terms are compared case-insensitively as substrings. Well-known
//! services are expanded into the fragments their windows actually show, so
//! blacklisting `twitter` also catches a browser tab titled `Home / X`.

use crate::collector::WindowDescriptor;

/// Blacklist used when no settings have been saved yet.
pub const DEFAULT_BLACKLIST: &[&str] = &["youtube", "twitter", "instagram", "steam"];

/// Fragments identifying Focus Fee's own windows.
pub const DEFAULT_SELF_MARKERS: &[&str] = &["focus-fee", "focus_fee", "focus fee"];

/// Canonical service name to the title/domain fragments its windows contain.
///
/// Read-only: user terms are looked up here, never merged in.
const EXPANSIONS: &[(&str, &[&str])] = &[
    ("youtube", &["youtube", "youtu.be"]),
    ("twitter", &["twitter", "x.com", "/ x", "tweetdeck"]),
    ("x", &["x.com", "/ x", "twitter"]),
    ("instagram", &["instagram", "instagr.am"]),
    ("facebook", &["facebook", "fb.com", "messenger"]),
    ("reddit", &["reddit", "redd.it"]),
    ("tiktok", &["tiktok"]),
    ("twitch", &["twitch"]),
    ("netflix", &["netflix"]),
    ("steam", &["steam", "steampowered"]),
    ("discord", &["discord"]),
];

/// Fragments to search for when `term` is on the blacklist.
///
/// Known services expand to their registered variants; anything else is used
/// as-is. Blank terms expand to nothing.
pub fn expand_term(term: &str) -> Vec<String> {
    let key = term.trim().to_lowercase();
    if key.is_empty() {
        return Vec::new();
    }

    match EXPANSIONS.iter().find(|(name, _)| *name == key) {
        Some((_, fragments)) => fragments.iter().map(|f| f.to_string()).collect(),
        None => vec![key],
    }
}

/// Whether `window` belongs to something on the blacklist.
pub fn matches<S: AsRef<str>>(window: Option<&WindowDescriptor>, terms: &[S]) -> bool {
    let Some(window) = window else {
        return false;
    };

    let title = window.title.to_lowercase();
    let owner = window.owner().to_lowercase();

    terms
        .iter()
        .flat_map(|term| expand_term(term.as_ref()))
        .any(|fragment| title.contains(&fragment) || owner.contains(&fragment))
}

/// Whether `window` is one of Focus Fee's own windows.
pub fn is_self<S: AsRef<str>>(window: Option<&WindowDescriptor>, markers: &[S]) -> bool {
    let Some(window) = window else {
        return false;
    };

    let title = window.title.to_lowercase();
    let owner = window.owner().to_lowercase();

    markers
        .iter()
        .map(|m| m.as_ref().trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .any(|m| title.contains(&m) || owner.contains(&m))
}

/// Lowercase, trim, drop blanks and duplicates while keeping first-seen order.
pub fn normalize_blacklist<I, S>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for term in terms {
        let term = term.as_ref().trim().to_lowercase();
        if !term.is_empty() && !normalized.contains(&term) {
            normalized.push(term);
        }
    }
    normalized
}

/// The built-in blacklist as owned strings.
pub fn default_blacklist() -> Vec<String> {
    DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect()
}
