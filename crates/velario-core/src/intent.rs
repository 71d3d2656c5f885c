use crate::hotkey::HotkeyBinding;

/// A user-initiated command from the tray menu, the hotkey dialog, or
/// the global hotkey itself.
///
/// Intents are the only way UI events reach the controller, which
/// keeps the dispatch logic testable without a real tray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Toggle desktop icon visibility now.
    ToggleIcons,
    /// Flip the run-at-login registration.
    ToggleAutostart,
    /// Open the hotkey capture dialog.
    ChangeHotkey,
    /// A new binding was chosen in the dialog.
    ApplyHotkey(HotkeyBinding),
    /// Query GitHub for a newer release.
    CheckForUpdates { user_initiated: bool },
    /// Show the about box.
    About,
    /// Quit the application.
    Exit,
}
