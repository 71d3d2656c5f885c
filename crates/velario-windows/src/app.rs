//! The controller thread.
//!
//! Owns a hidden window that anchors the tray icon, runs the Win32
//! message pump, and executes the effects returned by the pure
//! controller in `velario_core`. Worker threads (update check,
//! download) and the hotkey thread send their results through an mpsc
//! channel and wake this thread by posting [`WM_APP_WAKE`] to the
//! controller window, so every controller transition happens on this
//! one thread. The wake is a window message rather than a thread
//! message so it survives modal message loops (menus, message boxes),
//! which dispatch window messages but drop thread messages.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use velario_core::controller::{Controller, Effect, Event};
use velario_core::hotkey::{HotkeyBinding, Modifier};
use velario_core::intent::Intent;
use velario_core::update::{DownloadShared, staged_path};
use velario_core::version::Release;
use velario_core::{log_error, log_info, settings};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, IDYES, MB_ICONINFORMATION,
    MB_ICONQUESTION, MB_ICONWARNING, MB_OK, MB_YESNO, MESSAGEBOX_RESULT, MESSAGEBOX_STYLE, MSG,
    MessageBoxW, PostMessageW, PostQuitMessage, RegisterClassW, TranslateMessage, WM_APP,
    WM_COMMAND, WM_CONTEXTMENU, WM_DESTROY, WM_LBUTTONDBLCLK, WM_RBUTTONUP, WNDCLASSW,
    WS_EX_TOOLWINDOW,
};
use windows::core::{PCWSTR, w};

use crate::hotkey_dialog::{self, WM_APP_HOTKEY_CHOSEN};
use crate::progress_window::{self, ProgressWindow};
use crate::tray::{self, Tray, WM_TRAYICON};
use crate::{autostart, desktop, event_loop, replace, updater};

/// Posted to the controller window to drain the controller channel.
const WM_APP_WAKE: u32 = WM_APP + 1;

/// Wakes the controller thread from any thread by posting to its
/// window. The handle is carried as a raw value because `HWND` itself
/// is not `Send`; posting to a destroyed window fails harmlessly.
#[derive(Clone, Copy)]
pub(crate) struct Waker {
    hwnd: isize,
}

impl Waker {
    fn for_window(hwnd: HWND) -> Self {
        Self {
            hwnd: hwnd.0 as isize,
        }
    }

    pub fn wake(&self) {
        // SAFETY: PostMessageW validates the handle; a stale handle
        // makes the call fail, nothing more.
        unsafe {
            let _ = PostMessageW(
                Some(HWND(self.hwnd as *mut _)),
                WM_APP_WAKE,
                WPARAM(0),
                LPARAM(0),
            );
        }
    }
}

struct App {
    controller: Controller,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    waker: Waker,
    hwnd: HWND,
    tray: Option<Tray>,
    event_loop: Option<event_loop::EventLoopHandle>,
    progress: Option<ProgressWindow>,
    download: Option<Arc<DownloadShared>>,
}

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

/// Runs the tray controller until the user exits. This is the whole
/// application: settings, logging, tray, hotkey thread, update flow.
pub fn run() -> Result<(), String> {
    let config = settings::load();
    velario_core::log::init(&config.logging);
    clean_stale_staging();

    let binding = config.hotkey.binding();
    log_info!("Velario {} started", env!("CARGO_PKG_VERSION"));

    let hwnd = create_controller_window()?;
    let (tx, rx) = mpsc::channel::<Event>();
    let waker = Waker::for_window(hwnd);

    let tray = Tray::add(hwnd, &tray::tooltip(binding));
    let event_loop = event_loop::start(tx.clone(), waker, binding)?;

    APP.with_borrow_mut(|app| {
        *app = Some(App {
            controller: Controller::new(binding),
            tx,
            rx,
            waker,
            hwnd,
            tray: Some(tray),
            event_loop: Some(event_loop),
            progress: None,
            download: None,
        });
    });

    // Silent check on startup; failures only reach the log.
    dispatch(Event::Intent(Intent::CheckForUpdates { user_initiated: false }));

    run_message_pump();

    // Teardown: drop the tray icon, stop the hotkey thread.
    if let Some(app) = APP.with_borrow_mut(Option::take) {
        drop(app.tray);
        if let Some(event_loop) = app.event_loop {
            event_loop.stop();
        }
    }
    log_info!("Velario stopped");
    Ok(())
}

/// The main pump. Blocks until the controller window posts `WM_QUIT`.
fn run_message_pump() {
    let mut msg = MSG::default();

    while unsafe { GetMessageW(&mut msg, None, 0, 0).as_bool() } {
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

fn drain_events() {
    loop {
        let event = APP.with_borrow_mut(|app| app.as_mut().and_then(|a| a.rx.try_recv().ok()));
        match event {
            Some(e) => dispatch(e),
            None => break,
        }
    }
}

/// Feeds one event through the controller and executes its effects.
///
/// The controller call is pure, so the `APP` borrow is released
/// before any effect runs; effects that pump their own message loops
/// (message boxes, the popup menu) therefore cannot re-enter a live
/// borrow.
fn dispatch(event: Event) {
    let effects = APP.with_borrow_mut(|app| app.as_mut().map(|a| a.controller.handle(event)));
    for effect in effects.unwrap_or_default() {
        run_effect(effect);
    }
}

fn run_effect(effect: Effect) {
    match effect {
        Effect::ToggleIcons => desktop::toggle_icons(),
        Effect::ToggleAutostart => toggle_autostart(),
        Effect::OpenHotkeyDialog(binding) => {
            let hwnd = APP.with_borrow(|app| app.as_ref().map(|a| a.hwnd));
            if let Some(hwnd) = hwnd {
                hotkey_dialog::show(hwnd, binding);
            }
        }
        Effect::Rebind(binding) => {
            APP.with_borrow(|app| {
                if let Some(a) = app.as_ref()
                    && let Some(el) = a.event_loop.as_ref()
                {
                    el.rebind(binding);
                }
            });
        }
        Effect::SaveBinding(binding) => {
            if let Err(e) = settings::save_binding(binding) {
                log_error!("could not save settings: {e}");
            }
        }
        Effect::UpdateTooltip(binding) => {
            APP.with_borrow(|app| {
                if let Some(a) = app.as_ref()
                    && let Some(t) = a.tray.as_ref()
                {
                    t.set_tooltip(&tray::tooltip(binding));
                }
            });
        }
        Effect::StartCheck => {
            let wiring = APP.with_borrow(|app| app.as_ref().map(|a| (a.tx.clone(), a.waker)));
            if let Some((tx, waker)) = wiring {
                updater::spawn_check(tx, waker);
            }
        }
        Effect::StartDownload(release) => start_download(release),
        Effect::ShowProgress(tag) => {
            let shared = APP.with_borrow(|app| app.as_ref().and_then(|a| a.download.clone()));
            if let Some(shared) = shared {
                let window = progress_window::open(shared, &tag);
                APP.with_borrow_mut(|app| {
                    if let Some(a) = app.as_mut() {
                        a.progress = window;
                    }
                });
            }
        }
        Effect::CloseProgress => {
            let progress = APP.with_borrow_mut(|app| {
                app.as_mut().and_then(|a| {
                    a.download = None;
                    a.progress.take()
                })
            });
            if let Some(window) = progress {
                window.close();
            }
        }
        Effect::ConfirmUpdate(tag) => {
            let accepted = message_box(
                &format!("Version {tag} is available. Download and install it now?"),
                MB_YESNO | MB_ICONQUESTION,
            ) == IDYES;
            dispatch(Event::ConfirmResult(accepted));
        }
        Effect::ShowInfo(text) => {
            message_box(&text, MB_OK | MB_ICONINFORMATION);
        }
        Effect::ShowError(text) => {
            message_box(&text, MB_OK | MB_ICONWARNING);
        }
        Effect::Handoff(staged) => match replace::handoff(&staged) {
            Ok(()) => unsafe { PostQuitMessage(0) },
            Err(e) => {
                let _ = std::fs::remove_file(&staged);
                dispatch(Event::HandoffFailed(e));
            }
        },
        Effect::ShowAbout => {
            message_box(
                &format!(
                    "Velario {}\n\nToggles desktop icon visibility with a global hotkey.\nhttps://github.com/velario-app/velario",
                    env!("CARGO_PKG_VERSION")
                ),
                MB_OK | MB_ICONINFORMATION,
            );
        }
        Effect::Quit => unsafe { PostQuitMessage(0) },
    }
}

fn toggle_autostart() {
    let result = if autostart::is_enabled() {
        autostart::disable()
    } else {
        autostart::enable()
    };
    if let Err(e) = result {
        log_error!("autostart toggle failed: {e}");
        message_box(
            "Could not update the startup registration.",
            MB_OK | MB_ICONWARNING,
        );
    }
}

fn start_download(release: Release) {
    let shared = Arc::new(DownloadShared::new());
    let wiring = APP.with_borrow_mut(|app| {
        app.as_mut().map(|a| {
            a.download = Some(shared.clone());
            (a.tx.clone(), a.waker)
        })
    });
    if let Some((tx, waker)) = wiring {
        updater::spawn_download(release, shared, tx, waker);
    }
}

/// Creates the hidden window that anchors the tray icon and receives
/// its callbacks.
///
/// `WS_EX_TOOLWINDOW` keeps it out of the taskbar; it is never shown.
fn create_controller_window() -> Result<HWND, String> {
    unsafe {
        let class_name = w!("VelarioController");
        let wc = WNDCLASSW {
            lpfnWndProc: Some(controller_proc),
            lpszClassName: class_name.into(),
            ..Default::default()
        };

        if RegisterClassW(&wc) == 0 {
            return Err("failed to register controller window class".into());
        }

        let hwnd = CreateWindowExW(
            WS_EX_TOOLWINDOW,
            class_name,
            w!("VelarioController"),
            Default::default(),
            0,
            0,
            0,
            0,
            None,
            None,
            None,
            None,
        );

        match hwnd {
            Ok(h) if !h.is_invalid() => Ok(h),
            _ => Err("failed to create controller window".into()),
        }
    }
}

/// WNDPROC for the controller window: tray callbacks, menu commands,
/// and the hotkey dialog's result.
unsafe extern "system" fn controller_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_APP_WAKE => {
            drain_events();
            LRESULT(0)
        }
        WM_TRAYICON => {
            match lparam.0 as u32 {
                WM_RBUTTONUP | WM_CONTEXTMENU => tray::show_menu(hwnd),
                WM_LBUTTONDBLCLK => dispatch(Event::Intent(Intent::ToggleIcons)),
                _ => {}
            }
            LRESULT(0)
        }
        WM_COMMAND => {
            if let Some(intent) = tray::menu_intent((wparam.0 & 0xFFFF) as u16) {
                dispatch(Event::Intent(intent));
            }
            LRESULT(0)
        }
        WM_APP_HOTKEY_CHOSEN => {
            if let Some(modifier) = Modifier::from_code(wparam.0 as u32)
                && let Some(binding) = HotkeyBinding::new(modifier, lparam.0 as u32)
            {
                dispatch(Event::Intent(Intent::ApplyHotkey(binding)));
            }
            LRESULT(0)
        }
        WM_DESTROY => {
            // SAFETY: ends the pump; teardown happens after run_message_pump.
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Shows a message box owned by the controller window.
fn message_box(text: &str, style: MESSAGEBOX_STYLE) -> MESSAGEBOX_RESULT {
    let hwnd = APP.with_borrow(|app| app.as_ref().map(|a| a.hwnd));
    let text_w: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    // SAFETY: MessageBoxW with valid wide strings; it runs its own
    // modal message loop on this thread.
    unsafe { MessageBoxW(hwnd, PCWSTR(text_w.as_ptr()), w!("Velario"), style) }
}

/// Removes a staged `.new` binary left behind if a previous handoff
/// was interrupted before the replace script ran.
fn clean_stale_staging() {
    if let Ok(exe) = std::env::current_exe() {
        let staged = staged_path(&exe);
        if staged.exists() {
            let _ = std::fs::remove_file(&staged);
        }
    }
}
