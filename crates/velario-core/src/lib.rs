pub mod controller;
pub mod desktop;
pub mod hotkey;
pub mod intent;
pub mod log;
pub mod script;
pub mod settings;
pub mod update;
pub mod version;

pub use controller::{Controller, Effect, Event};
pub use hotkey::{HotkeyBinding, HotkeyError, Modifier};
pub use intent::Intent;
pub use update::DownloadOutcome;
pub use version::Release;
