//! Run-at-login registration via the HKCU Run registry key.
//!
//! Writes a `Velario` value under
//! `HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Run`
//! pointing at the executable. No elevation is required since HKCU is
//! per-user.

use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ, RegCloseKey,
    RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};
use windows::core::PCWSTR;

const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
const VALUE_NAME: &str = "Velario";

/// ERROR_FILE_NOT_FOUND: deleting a value that does not exist.
const NOT_FOUND: u32 = 2;

/// Registers Velario to start on logon.
pub fn enable() -> Result<(), String> {
    let exe = std::env::current_exe().map_err(|e| format!("could not resolve exe path: {e}"))?;
    let command = format!("\"{}\"", exe.display());

    with_run_key(KEY_SET_VALUE, |key| {
        let name = to_wide(VALUE_NAME);
        let value = to_wide(&command);
        // SAFETY: reinterpreting &[u16] as &[u8] is sound; the buffer is
        // contiguous and the byte length is computed from it.
        let bytes: &[u8] =
            unsafe { std::slice::from_raw_parts(value.as_ptr().cast(), value.len() * 2) };
        // SAFETY: RegSetValueExW with a REG_SZ payload and its exact
        // byte length.
        let status =
            unsafe { RegSetValueExW(key, PCWSTR(name.as_ptr()), None, REG_SZ, Some(bytes)) };
        if status.is_err() {
            return Err(format!("could not write registry value: {status:?}"));
        }
        Ok(())
    })
}

/// Removes the autostart entry. A value that never existed counts as
/// removed.
pub fn disable() -> Result<(), String> {
    with_run_key(KEY_SET_VALUE, |key| {
        let name = to_wide(VALUE_NAME);
        // SAFETY: RegDeleteValueW is a standard Win32 registry API.
        let status = unsafe { RegDeleteValueW(key, PCWSTR(name.as_ptr())) };
        if status.is_err() && status.0 as u32 != NOT_FOUND {
            return Err(format!("could not delete registry value: {status:?}"));
        }
        Ok(())
    })
}

/// Returns whether the autostart entry currently exists.
pub fn is_enabled() -> bool {
    with_run_key(KEY_QUERY_VALUE, |key| {
        let name = to_wide(VALUE_NAME);
        // SAFETY: RegQueryValueExW with null buffers only checks existence.
        let status =
            unsafe { RegQueryValueExW(key, PCWSTR(name.as_ptr()), None, None, None, None) };
        if status.is_ok() { Ok(()) } else { Err(String::new()) }
    })
    .is_ok()
}

/// Opens the Run key with the given access, runs `f`, and closes the
/// key again regardless of the outcome.
fn with_run_key<T>(
    access: REG_SAM_FLAGS,
    f: impl FnOnce(HKEY) -> Result<T, String>,
) -> Result<T, String> {
    let wide_key = to_wide(RUN_KEY);
    let mut key = HKEY::default();
    // SAFETY: RegOpenKeyExW with valid pointers; the key is closed below.
    let status = unsafe {
        RegOpenKeyExW(
            HKEY_CURRENT_USER,
            PCWSTR(wide_key.as_ptr()),
            None,
            access,
            &mut key,
        )
    };
    if status.is_err() {
        return Err(format!("could not open registry key: {status:?}"));
    }

    let result = f(key);

    // SAFETY: RegCloseKey is safe to call on any valid HKEY.
    let _ = unsafe { RegCloseKey(key) };
    result
}

/// Converts a `&str` to a null-terminated wide (UTF-16) string.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
