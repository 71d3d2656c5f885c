//! Per-user settings: the hotkey (persisted as two raw integers) and
//! the logging configuration.
//!
//! Loaded from `~/.config/velario/settings.toml`. Missing files and
//! malformed values silently fall back to defaults, so a broken
//! settings file can never keep the tray from starting.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hotkey::{HotkeyBinding, Modifier};
use crate::log::LogConfig;

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hotkey: HotkeySetting,
    pub logging: LogConfig,
}

/// The persisted hotkey: a Win32 `MOD_*` flag value and a virtual-key
/// code, exactly as the OS consumes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySetting {
    pub modifier: u32,
    pub key: u32,
}

impl Default for HotkeySetting {
    fn default() -> Self {
        Self::from_binding(HotkeyBinding::default_binding())
    }
}

impl HotkeySetting {
    pub fn from_binding(binding: HotkeyBinding) -> Self {
        Self {
            modifier: binding.modifier.code(),
            key: binding.key,
        }
    }

    /// Decodes the stored integers, falling back to Ctrl+D when either
    /// is out of range (unknown modifier flag, or a modifier key stored
    /// as the primary key).
    pub fn binding(&self) -> HotkeyBinding {
        Modifier::from_code(self.modifier)
            .and_then(|m| HotkeyBinding::new(m, self.key))
            .unwrap_or_else(HotkeyBinding::default_binding)
    }
}

/// Returns the config directory: `~/.config/velario/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config").join("velario"))
}

/// Returns the settings file path: `~/.config/velario/settings.toml`.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.toml"))
}

/// Tries to load and parse `settings.toml`.
///
/// Returns an error string describing what went wrong (IO error,
/// parse error, etc.).
pub fn try_load() -> Result<Settings, String> {
    let path = settings_path().ok_or("could not determine settings path")?;
    let content = std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    toml::from_str(&content).map_err(|e| format!("{}: {e}", path.display()))
}

/// Loads the settings, falling back to defaults.
///
/// A non-existent file silently returns defaults; other errors are
/// logged to stderr first.
pub fn load() -> Settings {
    match try_load() {
        Ok(settings) => settings,
        Err(e) if is_file_not_found(&e) => Settings::default(),
        Err(e) => {
            eprintln!("Warning: {e}");
            Settings::default()
        }
    }
}

/// Persists a newly chosen hotkey, keeping the rest of the file.
pub fn save_binding(binding: HotkeyBinding) -> Result<(), String> {
    let path = settings_path().ok_or("could not determine settings path")?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
    }

    let mut settings = load();
    settings.hotkey = HotkeySetting::from_binding(binding);

    let content =
        toml::to_string_pretty(&settings).map_err(|e| format!("could not serialize settings: {e}"))?;
    std::fs::write(&path, content).map_err(|e| format!("{}: {e}", path.display()))
}

/// Returns true if the error message indicates a missing file.
fn is_file_not_found(e: &str) -> bool {
    e.contains("cannot find the path") || e.contains("The system cannot find") || e.contains("No such file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binding_is_ctrl_d() {
        let settings = Settings::default();

        let binding = settings.hotkey.binding();

        assert_eq!(binding.modifier, Modifier::Ctrl);
        assert_eq!(binding.key, 0x44);
    }

    #[test]
    fn stored_integers_round_trip() {
        let binding = HotkeyBinding::new(Modifier::Win, 0x70).unwrap(); // Win+F1

        let setting = HotkeySetting::from_binding(binding);

        assert_eq!(setting.modifier, 0x0008);
        assert_eq!(setting.key, 0x70);
        assert_eq!(setting.binding(), binding);
    }

    #[test]
    fn unknown_modifier_falls_back_to_default() {
        let setting = HotkeySetting { modifier: 99, key: 0x44 };

        assert_eq!(setting.binding(), HotkeyBinding::default_binding());
    }

    #[test]
    fn modifier_key_as_primary_falls_back_to_default() {
        let setting = HotkeySetting { modifier: 0x0002, key: 0x10 }; // Ctrl+Shift?!

        assert_eq!(setting.binding(), HotkeyBinding::default_binding());
    }

    #[test]
    fn partial_toml_uses_defaults_for_missing_sections() {
        // Arrange
        let toml_str = "[hotkey]\nmodifier = 1\nkey = 72\n";

        // Act
        let settings: Settings = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(settings.hotkey.binding(), HotkeyBinding::new(Modifier::Alt, 0x48).unwrap());
        assert!(!settings.logging.enabled);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let settings: Settings = toml::from_str("").unwrap();

        assert_eq!(settings.hotkey.binding(), HotkeyBinding::default_binding());
    }

    #[test]
    fn serialized_settings_parse_back() {
        let mut settings = Settings::default();
        settings.hotkey = HotkeySetting::from_binding(HotkeyBinding::new(Modifier::Shift, 0x20).unwrap());

        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();

        assert_eq!(parsed.hotkey.binding(), settings.hotkey.binding());
    }
}
