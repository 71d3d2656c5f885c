//! Tray icon and menu.
//!
//! The icon hangs off the hidden controller window (`crate::app`) and
//! reports clicks through `WM_TRAYICON`. The menu is rebuilt on every
//! open so the autostart check mark always reflects the registry.

use velario_core::hotkey::HotkeyBinding;
use velario_core::intent::Intent;
use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::UI::Shell::{
    NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY, NOTIFYICONDATAW,
    Shell_NotifyIconW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, DestroyMenu, GetCursorPos, IDI_APPLICATION, LoadIconW,
    MF_CHECKED, MF_SEPARATOR, MF_STRING, SetForegroundWindow, TPM_BOTTOMALIGN, TPM_LEFTALIGN,
    TrackPopupMenu, WM_APP,
};
use windows::core::PCWSTR;

use crate::{autostart, keys};

/// Tray callback message delivered to the controller window.
pub(crate) const WM_TRAYICON: u32 = WM_APP + 2;

const TRAY_ID: u32 = 1;

// Menu command ids, dispatched via WM_COMMAND.
const IDM_TOGGLE: u16 = 1;
const IDM_AUTOSTART: u16 = 2;
const IDM_HOTKEY: u16 = 3;
const IDM_UPDATE: u16 = 4;
const IDM_ABOUT: u16 = 5;
const IDM_EXIT: u16 = 6;

/// The tray icon attached to the controller window.
pub(crate) struct Tray {
    hwnd: HWND,
}

impl Tray {
    /// Adds the icon with the given tooltip.
    pub fn add(hwnd: HWND, tip: &str) -> Self {
        let mut nid = base_data(hwnd);
        nid.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        nid.uCallbackMessage = WM_TRAYICON;
        // SAFETY: LoadIconW with a null instance loads the stock
        // application icon.
        nid.hIcon = unsafe { LoadIconW(None, IDI_APPLICATION) }.unwrap_or_default();
        write_tip(&mut nid, tip);

        // SAFETY: NIM_ADD with a fully initialised NOTIFYICONDATAW.
        unsafe {
            let _ = Shell_NotifyIconW(NIM_ADD, &nid);
        }
        Self { hwnd }
    }

    /// Replaces the tooltip text.
    pub fn set_tooltip(&self, tip: &str) {
        let mut nid = base_data(self.hwnd);
        nid.uFlags = NIF_TIP;
        write_tip(&mut nid, tip);
        // SAFETY: NIM_MODIFY updates only the fields named in uFlags.
        unsafe {
            let _ = Shell_NotifyIconW(NIM_MODIFY, &nid);
        }
    }
}

impl Drop for Tray {
    fn drop(&mut self) {
        // SAFETY: NIM_DELETE removes the icon; harmless if it is gone.
        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &base_data(self.hwnd));
        }
    }
}

/// The tooltip: application name plus the active hotkey.
pub(crate) fn tooltip(binding: HotkeyBinding) -> String {
    format!(
        "Velario ({} + {})",
        binding.modifier.name(),
        keys::name_from_vk(binding.key)
    )
}

/// Shows the context menu at the cursor and lets `TrackPopupMenu`
/// deliver the choice to `hwnd` as `WM_COMMAND`.
pub(crate) fn show_menu(hwnd: HWND) {
    let items: &[(u16, &str, bool)] = &[
        (IDM_TOGGLE, "Toggle Icons Now", false),
        (0, "", false),
        (IDM_AUTOSTART, "Run at Startup", autostart::is_enabled()),
        (IDM_HOTKEY, "Change Hotkey...", false),
        (0, "", false),
        (IDM_UPDATE, "Check for Updates", false),
        (IDM_ABOUT, "About Velario", false),
        (0, "", false),
        (IDM_EXIT, "Exit", false),
    ];

    unsafe {
        let Ok(menu) = CreatePopupMenu() else {
            return;
        };

        for &(id, label, checked) in items {
            if id == 0 {
                let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
                continue;
            }
            let flags = if checked { MF_STRING | MF_CHECKED } else { MF_STRING };
            let label_w = to_wide(label);
            let _ = AppendMenuW(menu, flags, id as usize, PCWSTR(label_w.as_ptr()));
        }

        // Required before TrackPopupMenu so the menu dismisses when the
        // user clicks elsewhere.
        let _ = SetForegroundWindow(hwnd);

        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);
        let _ = TrackPopupMenu(menu, TPM_LEFTALIGN | TPM_BOTTOMALIGN, pt.x, pt.y, 0, hwnd, None);
        let _ = DestroyMenu(menu);
    }
}

/// Maps a menu command id to the intent it stands for.
pub(crate) fn menu_intent(command: u16) -> Option<Intent> {
    match command {
        IDM_TOGGLE => Some(Intent::ToggleIcons),
        IDM_AUTOSTART => Some(Intent::ToggleAutostart),
        IDM_HOTKEY => Some(Intent::ChangeHotkey),
        IDM_UPDATE => Some(Intent::CheckForUpdates { user_initiated: true }),
        IDM_ABOUT => Some(Intent::About),
        IDM_EXIT => Some(Intent::Exit),
        _ => None,
    }
}

fn base_data(hwnd: HWND) -> NOTIFYICONDATAW {
    let mut nid = NOTIFYICONDATAW::default();
    nid.cbSize = size_of::<NOTIFYICONDATAW>() as u32;
    nid.hWnd = hwnd;
    nid.uID = TRAY_ID;
    nid
}

/// Copies `tip` into the fixed-size tooltip buffer, truncating and
/// keeping the terminator.
fn write_tip(nid: &mut NOTIFYICONDATAW, tip: &str) {
    let wide: Vec<u16> = tip.encode_utf16().collect();
    let len = wide.len().min(nid.szTip.len() - 1);
    nid.szTip[..len].copy_from_slice(&wide[..len]);
    nid.szTip[len] = 0;
}

/// Converts a `&str` to a null-terminated wide (UTF-16) string.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
