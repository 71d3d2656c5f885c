//! The hotkey thread.
//!
//! Global hotkeys are bound to a thread's message queue, so a
//! dedicated thread owns the registrar and runs its own Win32 pump.
//! `WM_HOTKEY` triggers the icon toggle synchronously right here
//! (the toggle is a single SendMessage, fast enough to run on the
//! delivery thread). Re-bind requests arrive as thread messages
//! posted from the controller thread; results are reported back over
//! the controller channel.

use std::sync::mpsc::{self, Sender};
use std::thread;

use velario_core::controller::Event;
use velario_core::hotkey::{HotkeyBinding, Modifier, Registrar};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, MSG, PM_NOREMOVE, PeekMessageW, PostThreadMessageW,
    TranslateMessage, WM_APP, WM_HOTKEY, WM_QUIT, WM_USER,
};

use crate::app::Waker;
use crate::desktop;
use crate::hotkey::Win32HotkeyHost;

/// Thread message asking the hotkey thread to re-register:
/// wParam carries the modifier code, lParam the virtual-key code.
const WM_APP_REBIND: u32 = WM_APP + 10;

/// Handle for controlling the hotkey thread.
pub struct EventLoopHandle {
    thread_id: u32,
    handle: thread::JoinHandle<()>,
}

impl EventLoopHandle {
    /// Asks the hotkey thread to replace the active binding. The
    /// result arrives later as `Event::RebindResult`.
    pub fn rebind(&self, binding: HotkeyBinding) {
        unsafe {
            let _ = PostThreadMessageW(
                self.thread_id,
                WM_APP_REBIND,
                WPARAM(binding.modifier.code() as usize),
                LPARAM(binding.key as isize),
            );
        }
    }

    /// Signals the pump to stop and waits for the thread to finish.
    pub fn stop(self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        let _ = self.handle.join();
    }
}

/// Starts the hotkey thread and registers `initial`.
///
/// A failed initial registration (combination already claimed
/// system-wide) is reported through `event_tx` like any re-bind
/// failure; the thread keeps running with no hotkey active.
pub fn start(
    event_tx: Sender<Event>,
    waker: Waker,
    initial: HotkeyBinding,
) -> Result<EventLoopHandle, String> {
    let (ready_tx, ready_rx) = mpsc::channel::<u32>();

    let handle = thread::spawn(move || {
        // SAFETY: GetCurrentThreadId has no preconditions.
        let thread_id = unsafe { GetCurrentThreadId() };

        // Force-create this thread's message queue before announcing
        // readiness, so a rebind posted right after start() returns
        // cannot be lost.
        let mut msg = MSG::default();
        // SAFETY: PeekMessageW with PM_NOREMOVE only inspects the queue.
        unsafe {
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }

        let mut registrar = Registrar::new(Win32HotkeyHost);
        if let Err(e) = registrar.register(initial) {
            let _ = event_tx.send(Event::RebindResult(Err(e)));
            waker.wake();
        }

        let _ = ready_tx.send(thread_id);

        run_message_pump(&mut registrar, &event_tx, waker);

        registrar.unregister();
    });

    let thread_id = ready_rx
        .recv()
        .map_err(|_| "hotkey thread exited unexpectedly".to_string())?;

    Ok(EventLoopHandle { thread_id, handle })
}

/// The Win32 message pump. Toggles on `WM_HOTKEY`, re-registers on
/// `WM_APP_REBIND`, and blocks until `WM_QUIT`.
fn run_message_pump(
    registrar: &mut Registrar<Win32HotkeyHost>,
    event_tx: &Sender<Event>,
    waker: Waker,
) {
    let mut msg = MSG::default();

    while unsafe { GetMessageW(&mut msg, None, 0, 0).as_bool() } {
        if msg.message == WM_HOTKEY {
            // Must stay fast: a slow handler would delay the next
            // hotkey delivery on this queue.
            desktop::toggle_icons();
            continue;
        }

        if msg.message == WM_APP_REBIND && msg.hwnd.is_invalid() {
            if let Some(binding) = decode_rebind(msg.wParam, msg.lParam) {
                let result = registrar.register(binding).map(|()| binding);
                let _ = event_tx.send(Event::RebindResult(result));
                waker.wake();
            }
            continue;
        }

        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

/// Unpacks a `WM_APP_REBIND` payload back into a binding.
fn decode_rebind(wparam: WPARAM, lparam: LPARAM) -> Option<HotkeyBinding> {
    let modifier = Modifier::from_code(wparam.0 as u32)?;
    HotkeyBinding::new(modifier, lparam.0 as u32)
}
