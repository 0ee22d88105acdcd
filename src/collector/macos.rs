//! macOS window enumeration using the CoreGraphics window list.
//!
//! `CGWindowListCopyWindowInfo` returns on-screen windows front to back. Owner
//! names are always available; window titles require Screen Recording
//! permission and come back empty without it, so the blacklist still matches
//! on the owning application. `kCGWindowBounds` is read so a window hidden
//! behind a maximized focused window is not taken as side by side.

use crate::collector::types::{
    CollectorError, WindowBounds, WindowDescriptor, WindowSnapshot, WindowSnapshotProvider,
};
use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};

/// Owners that paint system chrome rather than user windows.
const SYSTEM_OWNERS: &[&str] = &["Window Server", "Dock", "Control Center", "SystemUIServer"];

/// The macOS window collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacOSCollector;

impl MacOSCollector {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSnapshotProvider for MacOSCollector {
    fn snapshot(&self) -> Result<WindowSnapshot, CollectorError> {
        let options = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;
        let list = copy_window_info(options, kCGNullWindowID)
            .ok_or_else(|| CollectorError::Unavailable("CGWindowListCopyWindowInfo returned null".to_string()))?;

        let layer_key = CFString::from_static_string("kCGWindowLayer");
        let owner_key = CFString::from_static_string("kCGWindowOwnerName");
        let name_key = CFString::from_static_string("kCGWindowName");
        let bounds_key = CFString::from_static_string("kCGWindowBounds");

        let mut windows = Vec::new();
        for raw in list.iter() {
            let info: CFDictionary<CFString, CFType> =
                unsafe { CFDictionary::wrap_under_get_rule(*raw as CFDictionaryRef) };

            // Layer 0 holds normal application windows; menus and overlays sit above.
            let layer = info
                .find(&layer_key)
                .and_then(|v| v.downcast::<CFNumber>())
                .and_then(|n| n.to_i32())
                .unwrap_or(0);
            if layer != 0 {
                continue;
            }

            let owner = info
                .find(&owner_key)
                .and_then(|v| v.downcast::<CFString>())
                .map(|s| s.to_string());
            if owner
                .as_deref()
                .map(|o| SYSTEM_OWNERS.contains(&o))
                .unwrap_or(false)
            {
                continue;
            }

            let title = info
                .find(&name_key)
                .and_then(|v| v.downcast::<CFString>())
                .map(|s| s.to_string())
                .unwrap_or_default();

            let bounds = info.find(&bounds_key).and_then(|v| {
                if v.type_of() != CFDictionary::<CFString, CFType>::type_id() {
                    return None;
                }
                let rect: CFDictionary<CFString, CFType> =
                    unsafe { CFDictionary::wrap_under_get_rule(v.as_CFTypeRef() as CFDictionaryRef) };
                window_bounds(&rect)
            });

            windows.push((
                WindowDescriptor {
                    title,
                    owner_name: owner,
                },
                bounds,
            ));
        }

        Ok(WindowSnapshot::from_layered(windows))
    }
}

/// Decode a `kCGWindowBounds` dictionary (`X`, `Y`, `Width`, `Height`).
fn window_bounds(rect: &CFDictionary<CFString, CFType>) -> Option<WindowBounds> {
    let field = |name: &'static str| {
        rect.find(&CFString::from_static_string(name))
            .and_then(|v| v.downcast::<CFNumber>())
            .and_then(|n| n.to_f64())
    };
    Some(WindowBounds::new(
        field("X")?,
        field("Y")?,
        field("Width")?,
        field("Height")?,
    ))
}

/// Window titles are only visible with Screen Recording permission.
///
/// Returns true when at least one on-screen window exposes a title, which is
/// the cheapest observable proxy for the permission.
pub fn check_permission() -> bool {
    MacOSCollector::new()
        .snapshot()
        .map(|s| s.open.iter().any(|w| !w.title.is_empty()))
        .unwrap_or(false)
}
