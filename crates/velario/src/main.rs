// Tray-only application: no console window, no CLI surface.
#![windows_subsystem = "windows"]

use velario_core::log_error;

fn main() {
    if let Err(e) = velario_windows::run() {
        // No console to print to; the log file is the only witness.
        log_error!("startup failed: {e}");
    }
}
