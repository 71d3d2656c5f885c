//! Win32 implementation of the hotkey host.
//!
//! Bindings are registered on the current thread's message queue;
//! `WM_HOTKEY` arrives via the message pump running on that same
//! thread (see [`crate::event_loop`]). The registration policy itself
//! lives in `velario_core::hotkey::Registrar`.

use velario_core::hotkey::{HotkeyBinding, HotkeyError, HotkeyHost};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    HOT_KEY_MODIFIERS, MOD_NOREPEAT, RegisterHotKey, UnregisterHotKey,
};

/// Binds hotkeys to the calling thread via `RegisterHotKey`.
pub struct Win32HotkeyHost;

impl HotkeyHost for Win32HotkeyHost {
    fn bind(&mut self, id: i32, binding: HotkeyBinding) -> Result<(), HotkeyError> {
        let modifiers = HOT_KEY_MODIFIERS(binding.modifier.code()) | MOD_NOREPEAT;

        // SAFETY: RegisterHotKey registers a system-wide hotkey on the
        // current thread's message queue. A null hwnd routes WM_HOTKEY
        // to the thread message loop.
        let result = unsafe { RegisterHotKey(None, id, modifiers, binding.key) };

        // The only realistic failure for a well-formed binding is the
        // combination being claimed by another application.
        result.map_err(|_| HotkeyError::Conflict(binding))
    }

    fn unbind(&mut self, id: i32) {
        // SAFETY: UnregisterHotKey removes the registration; it fails
        // harmlessly when the id is not currently bound.
        unsafe {
            let _ = UnregisterHotKey(None, id);
        }
    }
}
