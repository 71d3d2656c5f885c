//! Hotkey capture dialog.
//!
//! A small modeless window: the user presses the new chord (modifier
//! held plus a key), the label echoes it, Save confirms. The chosen
//! binding is posted back to the controller window as
//! [`WM_APP_HOTKEY_CHOSEN`] with the modifier code in wParam and the
//! key code in lParam; closing the dialog without saving posts
//! nothing.

use std::cell::Cell;

use velario_core::hotkey::{HotkeyBinding, is_modifier_vk};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::GetSysColorBrush;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, SetFocus, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    COLOR_WINDOW, CreateWindowExW, DefWindowProcW, DestroyWindow, GetSystemMetrics, HMENU,
    IDC_ARROW, LoadCursorW, PostMessageW, RegisterClassW, SM_CXSCREEN, SM_CYSCREEN,
    SW_SHOW, SetWindowTextW, ShowWindow, WINDOW_STYLE, WM_APP, WM_CLOSE, WM_COMMAND, WM_DESTROY,
    WM_KEYDOWN, WM_SYSKEYDOWN, WNDCLASSW, WS_CAPTION, WS_CHILD, WS_EX_TOPMOST, WS_POPUP,
    WS_SYSMENU, WS_VISIBLE,
};
use windows::core::{PCWSTR, w};

use crate::keys;

/// Posted to the controller window when a binding is saved:
/// wParam = modifier code, lParam = virtual-key code.
pub(crate) const WM_APP_HOTKEY_CHOSEN: u32 = WM_APP + 3;

const ID_SAVE: u16 = 101;

const DIALOG_W: i32 = 300;
const DIALOG_H: i32 = 150;

#[derive(Clone, Copy)]
struct DialogState {
    parent: HWND,
    label: HWND,
    selection: Option<HotkeyBinding>,
}

thread_local! {
    // One dialog at a time, owned by the UI thread.
    static DIALOG: Cell<Option<DialogState>> = const { Cell::new(None) };
}

/// Opens the capture dialog. A second call while one is open is a
/// no-op.
pub(crate) fn show(parent: HWND, current: HotkeyBinding) {
    if DIALOG.get().is_some() {
        return;
    }

    unsafe {
        let class_name = w!("VelarioHotkeyDialog");
        let wc = WNDCLASSW {
            lpfnWndProc: Some(dialog_proc),
            lpszClassName: class_name.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: GetSysColorBrush(COLOR_WINDOW),
            ..Default::default()
        };
        // Returns 0 once the class exists; CreateWindowExW below still
        // works, so the result is not checked.
        RegisterClassW(&wc);

        let x = (GetSystemMetrics(SM_CXSCREEN) - DIALOG_W) / 2;
        let y = (GetSystemMetrics(SM_CYSCREEN) - DIALOG_H) / 2;

        let Ok(hwnd) = CreateWindowExW(
            WS_EX_TOPMOST,
            class_name,
            w!("Change Hotkey"),
            WS_POPUP | WS_CAPTION | WS_SYSMENU,
            x,
            y,
            DIALOG_W,
            DIALOG_H,
            None,
            None,
            None,
            None,
        ) else {
            return;
        };

        let label = CreateWindowExW(
            Default::default(),
            w!("STATIC"),
            w!(""),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(0x0001), // SS_CENTER
            10,
            20,
            DIALOG_W - 20,
            40,
            Some(hwnd),
            None,
            None,
            None,
        )
        .unwrap_or_default();

        let _ = CreateWindowExW(
            Default::default(),
            w!("BUTTON"),
            w!("Save"),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(0x0001), // BS_DEFPUSHBUTTON
            (DIALOG_W - 90) / 2,
            75,
            90,
            28,
            Some(hwnd),
            Some(HMENU(ID_SAVE as usize as *mut _)),
            None,
            None,
        );

        // Saving without pressing anything re-applies the current
        // binding, which the controller treats as a no-op.
        DIALOG.set(Some(DialogState {
            parent,
            label,
            selection: Some(current),
        }));
        set_label(label, &format!("Press the new hotkey (current: {})", chord(current)));

        let _ = ShowWindow(hwnd, SW_SHOW);
        // Keyboard input must land on the dialog itself, not the button.
        let _ = SetFocus(Some(hwnd));
    }
}

unsafe extern "system" fn dialog_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // WM_SYSKEYDOWN covers chords with Alt held.
        WM_KEYDOWN | WM_SYSKEYDOWN => {
            handle_keydown(wparam.0 as u32);
            LRESULT(0)
        }
        WM_COMMAND if (wparam.0 & 0xFFFF) as u16 == ID_SAVE => {
            if let Some(state) = DIALOG.get()
                && let Some(binding) = state.selection
            {
                unsafe {
                    let _ = PostMessageW(
                        Some(state.parent),
                        WM_APP_HOTKEY_CHOSEN,
                        WPARAM(binding.modifier.code() as usize),
                        LPARAM(binding.key as isize),
                    );
                    let _ = DestroyWindow(hwnd);
                }
            }
            LRESULT(0)
        }
        WM_CLOSE => {
            unsafe {
                let _ = DestroyWindow(hwnd);
            }
            LRESULT(0)
        }
        WM_DESTROY => {
            DIALOG.set(None);
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Updates the selection from a key-down and the live modifier state.
fn handle_keydown(vk: u32) {
    let Some(mut state) = DIALOG.get() else {
        return;
    };

    if is_modifier_vk(vk) {
        // Waiting for the primary key; nothing to echo yet.
        return;
    }

    let binding = HotkeyBinding::from_capture(
        vk,
        held(VK_CONTROL.0),
        held(VK_MENU.0),
        held(VK_SHIFT.0),
        held(VK_LWIN.0) || held(VK_RWIN.0),
    );

    match binding {
        Some(b) => {
            state.selection = Some(b);
            set_label(state.label, &format!("New hotkey: {}", chord(b)));
        }
        None => {
            set_label(state.label, "Hold a modifier key (Ctrl, Alt, Shift or Win)");
        }
    }
    DIALOG.set(Some(state));
}

/// Whether a virtual key is currently held.
fn held(vk: u16) -> bool {
    // SAFETY: GetKeyState reads the thread's keyboard state.
    let state = unsafe { GetKeyState(i32::from(vk)) };
    (state as u16 & 0x8000) != 0
}

fn chord(binding: HotkeyBinding) -> String {
    format!("{} + {}", binding.modifier.name(), keys::name_from_vk(binding.key))
}

fn set_label(label: HWND, text: &str) {
    let wide: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        let _ = SetWindowTextW(label, PCWSTR(wide.as_ptr()));
    }
}
