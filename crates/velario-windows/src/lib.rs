/// Main-thread controller: tray window, pump, effect execution.
pub mod app;

/// Autostart via the HKCU Run registry key.
pub mod autostart;

/// Desktop icon-view lookup and the toggle command.
pub mod desktop;

/// Dedicated hotkey thread with its own message pump.
pub mod event_loop;

/// Win32 implementation of the hotkey host.
pub mod hotkey;

/// Hotkey capture dialog.
pub mod hotkey_dialog;

/// Minimal HTTPS client over WinHTTP.
pub mod http;

/// Virtual-key code to display-name mapping.
pub mod keys;

/// Download progress window.
pub mod progress_window;

/// Replace-and-restart handoff.
pub mod replace;

/// Update check and download worker threads.
pub mod updater;

/// GitHub release check.
pub mod version_check;

pub use app::run;
