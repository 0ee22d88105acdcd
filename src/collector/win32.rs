//! Windows window enumeration using the Win32 window manager API.
//!
//! `EnumWindows` walks top-level windows in Z order (front to back). The
//! foreground window is moved to the front of the list so the snapshot's
//! active window always matches what has keyboard focus. Window rectangles
//! decide which window really sits beside it; minimized windows have none.

use crate::collector::types::{
    CollectorError, WindowBounds, WindowDescriptor, WindowSnapshot, WindowSnapshotProvider,
};
use std::path::Path;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId,
    IsIconic, IsWindowVisible,
};

/// The Windows window collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsCollector;

impl WindowsCollector {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSnapshotProvider for WindowsCollector {
    fn snapshot(&self) -> Result<WindowSnapshot, CollectorError> {
        let mut handles: Vec<HWND> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<HWND> as isize),
            )
        }
        .map_err(|e| CollectorError::Platform(e.to_string()))?;

        let foreground = unsafe { GetForegroundWindow() };

        let mut windows = Vec::with_capacity(handles.len());
        for hwnd in handles {
            let title = window_title(hwnd);
            if title.is_empty() {
                continue;
            }
            let entry = (
                WindowDescriptor {
                    title,
                    owner_name: process_name(hwnd),
                },
                window_bounds(hwnd),
            );
            if hwnd == foreground {
                windows.insert(0, entry);
            } else {
                windows.push(entry);
            }
        }

        Ok(WindowSnapshot::from_layered(windows))
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam.0 as *mut Vec<HWND>);
    if IsWindowVisible(hwnd).as_bool() {
        handles.push(hwnd);
    }
    BOOL::from(true)
}

fn window_title(hwnd: HWND) -> String {
    let mut buffer = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buffer[..len as usize])
}

/// Screen rectangle of `hwnd`, or `None` while it is minimized.
fn window_bounds(hwnd: HWND) -> Option<WindowBounds> {
    if unsafe { IsIconic(hwnd) }.as_bool() {
        return None;
    }
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    Some(WindowBounds::new(
        rect.left as f64,
        rect.top as f64,
        (rect.right - rect.left) as f64,
        (rect.bottom - rect.top) as f64,
    ))
}

/// Executable stem of the process owning `hwnd` (e.g. `chrome`).
fn process_name(hwnd: HWND) -> Option<String> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }

    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;

    let mut buffer = vec![0u16; 1024];
    let mut size = buffer.len() as u32;
    let queried = unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        )
    };
    let _ = unsafe { CloseHandle(handle) };
    queried.ok()?;

    let path = String::from_utf16_lossy(&buffer[..size as usize]);
    Path::new(&path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Window titles need no special permission on Windows.
pub fn check_permission() -> bool {
    true
}
