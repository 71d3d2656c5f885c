//! The desktop icon toggle.
//!
//! The icon view is a `SHELLDLL_DefView` child of the shell's
//! `Progman` window on most Windows versions; newer builds re-parent
//! it under one of the `WorkerW` windows (typically when wallpaper
//! slideshow or multi-monitor features are active). The search order
//! lives in `velario_core::desktop`; this module supplies the window
//! handles and sends the toggle command.

use velario_core::desktop::{DesktopShell, locate_icon_view};
use velario_core::log_debug;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{FindWindowExW, FindWindowW, SendMessageW, WM_COMMAND};
use windows::core::{PCWSTR, w};

/// The undocumented shell command that flips icon visibility, sent as
/// `WM_COMMAND` to the icon view.
const TOGGLE_DESKTOP_ICONS: usize = 0x7402;

/// The live shell window tree.
struct ShellWindows;

impl DesktopShell for ShellWindows {
    type Handle = HWND;

    fn primary_shell(&self) -> Option<HWND> {
        // SAFETY: FindWindowW only reads window state.
        unsafe { FindWindowW(w!("Progman"), w!("Program Manager")) }
            .ok()
            .filter(|h| !h.is_invalid())
    }

    fn icon_view_in(&self, host: HWND) -> Option<HWND> {
        // SAFETY: FindWindowExW only reads window state.
        unsafe { FindWindowExW(Some(host), None, w!("SHELLDLL_DefView"), PCWSTR::null()) }
            .ok()
            .filter(|h| !h.is_invalid())
    }

    fn next_secondary_host(&self, after: Option<HWND>) -> Option<HWND> {
        // SAFETY: FindWindowExW with a null parent walks top-level
        // windows, continuing after `after`.
        unsafe { FindWindowExW(None, after, w!("WorkerW"), PCWSTR::null()) }
            .ok()
            .filter(|h| !h.is_invalid())
    }
}

/// Toggles desktop icon visibility.
///
/// A no-op when no icon view can be found: the shell's internal
/// layout is undocumented and may change between OS updates, so a
/// missing view is logged but not surfaced.
pub fn toggle_icons() {
    let Some(view) = locate_icon_view(&ShellWindows) else {
        log_debug!("desktop icon view not found; toggle skipped");
        return;
    };

    // SAFETY: sending a WM_COMMAND to a window we do not own is safe;
    // the shell ignores commands it does not understand.
    unsafe {
        SendMessageW(
            view,
            WM_COMMAND,
            Some(WPARAM(TOGGLE_DESKTOP_ICONS)),
            Some(LPARAM(0)),
        );
    }
    log_debug!("desktop icons toggled");
}
