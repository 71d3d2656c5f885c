//! Download progress window.
//!
//! Modeless window with a progress bar, a rate label, and a Cancel
//! button. A 500 ms timer reads the shared counters published by the
//! download thread; Cancel (and the close box) only set the shared
//! cancel flag — the window itself is torn down by the controller
//! once the download reports its outcome.

use std::cell::RefCell;
use std::sync::Arc;

use velario_core::update::{DownloadShared, ProgressSnapshot};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::GetSysColorBrush;
use windows::Win32::UI::Controls::{
    ICC_PROGRESS_CLASS, INITCOMMONCONTROLSEX, InitCommonControlsEx, PBM_SETMARQUEE, PBM_SETPOS,
    PBM_SETRANGE32,
};
use windows::Win32::UI::WindowsAndMessaging::{
    COLOR_WINDOW, CreateWindowExW, DefWindowProcW, DestroyWindow, GetSystemMetrics, HMENU,
    IDC_ARROW, KillTimer, LoadCursorW, RegisterClassW, SM_CXSCREEN, SM_CYSCREEN, SW_SHOW,
    SendMessageW, SetTimer, SetWindowTextW, ShowWindow, WINDOW_STYLE, WM_CLOSE, WM_COMMAND,
    WM_DESTROY, WM_TIMER, WNDCLASSW, WS_CAPTION, WS_CHILD, WS_POPUP, WS_VISIBLE,
};
use windows::core::{PCWSTR, w};

const ID_CANCEL: u16 = 201;
const TIMER_ID: usize = 1;
const TIMER_MS: u32 = 500;

const WINDOW_W: i32 = 360;
const WINDOW_H: i32 = 150;

struct ProgressState {
    shared: Arc<DownloadShared>,
    bar: HWND,
    label: HWND,
    marquee: bool,
}

thread_local! {
    static PROGRESS: RefCell<Option<ProgressState>> = const { RefCell::new(None) };
}

/// The open progress window, owned by the controller.
pub(crate) struct ProgressWindow {
    hwnd: HWND,
}

impl ProgressWindow {
    /// Tears the window down (the download is over, either way).
    pub fn close(self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
        }
    }
}

/// Opens the progress window for a download publishing into `shared`.
pub(crate) fn open(shared: Arc<DownloadShared>, tag: &str) -> Option<ProgressWindow> {
    unsafe {
        init_common_controls();

        let class_name = w!("VelarioProgress");
        let wc = WNDCLASSW {
            lpfnWndProc: Some(progress_proc),
            lpszClassName: class_name.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: GetSysColorBrush(COLOR_WINDOW),
            ..Default::default()
        };
        // Returns 0 once the class exists; creation below still works.
        RegisterClassW(&wc);

        let x = (GetSystemMetrics(SM_CXSCREEN) - WINDOW_W) / 2;
        let y = (GetSystemMetrics(SM_CYSCREEN) - WINDOW_H) / 2;

        let title: Vec<u16> = format!("Downloading {tag}")
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let hwnd = CreateWindowExW(
            Default::default(),
            class_name,
            PCWSTR(title.as_ptr()),
            WS_POPUP | WS_CAPTION,
            x,
            y,
            WINDOW_W,
            WINDOW_H,
            None,
            None,
            None,
            None,
        )
        .ok()
        .filter(|h| !h.is_invalid())?;

        let label = CreateWindowExW(
            Default::default(),
            w!("STATIC"),
            w!("Starting download..."),
            WS_CHILD | WS_VISIBLE,
            15,
            12,
            WINDOW_W - 30,
            20,
            Some(hwnd),
            None,
            None,
            None,
        )
        .unwrap_or_default();

        // Marquee style is harmless while determinate positions are
        // set; it only animates once PBM_SETMARQUEE turns it on.
        let bar = CreateWindowExW(
            Default::default(),
            w!("msctls_progress32"),
            PCWSTR::null(),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(0x0008), // PBS_MARQUEE
            15,
            40,
            WINDOW_W - 30,
            22,
            Some(hwnd),
            None,
            None,
            None,
        )
        .unwrap_or_default();
        SendMessageW(bar, PBM_SETRANGE32, Some(WPARAM(0)), Some(LPARAM(100)));

        let _ = CreateWindowExW(
            Default::default(),
            w!("BUTTON"),
            w!("Cancel"),
            WS_CHILD | WS_VISIBLE | WINDOW_STYLE(0x0001), // BS_DEFPUSHBUTTON
            (WINDOW_W - 90) / 2,
            78,
            90,
            28,
            Some(hwnd),
            Some(HMENU(ID_CANCEL as usize as *mut _)),
            None,
            None,
        );

        PROGRESS.with_borrow_mut(|state| {
            *state = Some(ProgressState {
                shared,
                bar,
                label,
                marquee: false,
            });
        });

        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = SetTimer(Some(hwnd), TIMER_ID, TIMER_MS, None);

        Some(ProgressWindow { hwnd })
    }
}

unsafe extern "system" fn progress_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_TIMER if wparam.0 == TIMER_ID => {
            refresh();
            LRESULT(0)
        }
        WM_COMMAND if (wparam.0 & 0xFFFF) as u16 == ID_CANCEL => {
            request_cancel();
            LRESULT(0)
        }
        // The close box is a cancel request, not a teardown: the
        // controller closes the window when the outcome arrives.
        WM_CLOSE => {
            request_cancel();
            LRESULT(0)
        }
        WM_DESTROY => {
            unsafe {
                let _ = KillTimer(Some(hwnd), TIMER_ID);
            }
            PROGRESS.with_borrow_mut(|state| *state = None);
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn request_cancel() {
    PROGRESS.with_borrow(|state| {
        if let Some(s) = state {
            s.shared.request_cancel();
            set_text(s.label, "Cancelling...");
        }
    });
}

/// Pulls the latest counters into the bar and label.
fn refresh() {
    PROGRESS.with_borrow_mut(|state| {
        let Some(s) = state.as_mut() else {
            return;
        };
        if s.shared.is_cancelled() {
            return;
        }
        let snapshot = s.shared.snapshot();

        match snapshot.percent {
            Some(p) => unsafe {
                if s.marquee {
                    SendMessageW(s.bar, PBM_SETMARQUEE, Some(WPARAM(0)), Some(LPARAM(0)));
                    s.marquee = false;
                }
                SendMessageW(s.bar, PBM_SETPOS, Some(WPARAM(p as usize)), Some(LPARAM(0)));
            },
            None => unsafe {
                if !s.marquee {
                    SendMessageW(s.bar, PBM_SETMARQUEE, Some(WPARAM(1)), Some(LPARAM(0)));
                    s.marquee = true;
                }
            },
        }

        set_text(s.label, &progress_text(&snapshot));
    });
}

/// One line of progress: percent when the total is known, transferred
/// bytes otherwise, with the smoothed rate appended once measured.
fn progress_text(snapshot: &ProgressSnapshot) -> String {
    let lead = match snapshot.percent {
        Some(p) => format!("{p}%"),
        None => fmt_bytes(snapshot.transferred),
    };
    if snapshot.rate_bps == 0 {
        lead
    } else {
        format!("{lead} at {}/s", fmt_bytes(snapshot.rate_bps))
    }
}

fn fmt_bytes(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn set_text(hwnd: HWND, text: &str) {
    let wide: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        let _ = SetWindowTextW(hwnd, PCWSTR(wide.as_ptr()));
    }
}

fn init_common_controls() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let icc = INITCOMMONCONTROLSEX {
            dwSize: size_of::<INITCOMMONCONTROLSEX>() as u32,
            dwICC: ICC_PROGRESS_CLASS,
        };
        // SAFETY: InitCommonControlsEx reads the struct we pass.
        unsafe {
            let _ = InitCommonControlsEx(&icc);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(percent: Option<u32>, rate: u64, transferred: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            percent,
            rate_bps: rate,
            transferred,
            total: percent.map(|_| 100),
        }
    }

    #[test]
    fn known_total_shows_percent_and_rate() {
        let text = progress_text(&snapshot(Some(42), 1536 * 1024, 420));
        assert_eq!(text, "42% at 1.5 MB/s");
    }

    #[test]
    fn unknown_total_shows_transferred_bytes() {
        let text = progress_text(&snapshot(None, 2048, 5 * 1024 * 1024));
        assert_eq!(text, "5.0 MB at 2 KB/s");
    }

    #[test]
    fn zero_rate_is_left_out() {
        assert_eq!(progress_text(&snapshot(Some(0), 0, 0)), "0%");
    }

    #[test]
    fn byte_units_scale() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(10 * 1024), "10 KB");
        assert_eq!(fmt_bytes(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }
}
