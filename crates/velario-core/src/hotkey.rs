//! Hotkey binding model and registration policy.
//!
//! The Win32 calls live in the platform crate; this module owns the
//! binding type, its invariants (one modifier, one non-modifier key)
//! and the register/unregister policy over the [`HotkeyHost`] trait.

use serde::{Deserialize, Serialize};

/// The fixed registration id. Only one binding is ever active.
pub const HOTKEY_ID: i32 = 1;

/// Virtual-key codes that are themselves modifier keys and therefore
/// can never be the primary key of a binding.
const MODIFIER_VKS: &[u32] = &[
    0x10, 0x11, 0x12, // VK_SHIFT, VK_CONTROL, VK_MENU
    0x5B, 0x5C, // VK_LWIN, VK_RWIN
    0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, // left/right variants
];

/// Keyboard modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Alt,
    Ctrl,
    Shift,
    Win,
}

impl Modifier {
    /// Returns the Win32 `MOD_*` flag value. This is also the integer
    /// persisted in the settings file.
    pub fn code(self) -> u32 {
        match self {
            Self::Alt => 0x0001,
            Self::Ctrl => 0x0002,
            Self::Shift => 0x0004,
            Self::Win => 0x0008,
        }
    }

    /// Parses a persisted `MOD_*` value back into a modifier.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0001 => Some(Self::Alt),
            0x0002 => Some(Self::Ctrl),
            0x0004 => Some(Self::Shift),
            0x0008 => Some(Self::Win),
            _ => None,
        }
    }

    /// Display name used in the tooltip and the capture dialog.
    pub fn name(self) -> &'static str {
        match self {
            Self::Alt => "Alt",
            Self::Ctrl => "Ctrl",
            Self::Shift => "Shift",
            Self::Win => "Win",
        }
    }
}

/// A global hotkey: exactly one modifier plus one non-modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub modifier: Modifier,
    /// Virtual-key code of the primary key.
    pub key: u32,
}

impl HotkeyBinding {
    /// Creates a binding, rejecting modifier keys as the primary key.
    pub fn new(modifier: Modifier, key: u32) -> Option<Self> {
        if is_modifier_vk(key) {
            return None;
        }
        Some(Self { modifier, key })
    }

    /// The default binding: Ctrl+D.
    pub fn default_binding() -> Self {
        Self {
            modifier: Modifier::Ctrl,
            key: 0x44, // VK 'D'
        }
    }

    /// Builds a binding from a keyboard snapshot taken on key-down.
    ///
    /// `vk` is the pressed key; the flags say which modifiers were held
    /// at that moment. Modifier keys themselves and chords with no held
    /// modifier are rejected. When several modifiers are held the first
    /// of Ctrl, Alt, Shift, Win wins, keeping the one-modifier invariant.
    pub fn from_capture(vk: u32, ctrl: bool, alt: bool, shift: bool, win: bool) -> Option<Self> {
        let modifier = if ctrl {
            Modifier::Ctrl
        } else if alt {
            Modifier::Alt
        } else if shift {
            Modifier::Shift
        } else if win {
            Modifier::Win
        } else {
            return None;
        };
        Self::new(modifier, vk)
    }
}

/// Returns whether `vk` is a modifier key.
pub fn is_modifier_vk(vk: u32) -> bool {
    MODIFIER_VKS.contains(&vk)
}

/// Errors from hotkey registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    /// The key combination is already claimed system-wide.
    Conflict(HotkeyBinding),
}

impl std::fmt::Display for HotkeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(b) => {
                write!(f, "hotkey {} + key 0x{:02X} is already in use", b.modifier.name(), b.key)
            }
        }
    }
}

/// The OS-level binding surface, one implementation per platform.
///
/// The platform crate implements this over `RegisterHotKey`; tests use
/// a recording mock.
pub trait HotkeyHost {
    /// Binds `binding` under `id`. Fails when the combination is
    /// claimed elsewhere.
    fn bind(&mut self, id: i32, binding: HotkeyBinding) -> Result<(), HotkeyError>;

    /// Releases the binding under `id`. Must tolerate ids that are not
    /// currently bound.
    fn unbind(&mut self, id: i32);
}

/// Owns the single active binding and applies re-registration atomically
/// from the caller's perspective: the old binding is always released
/// before the new one is tried, and restored if the new one is rejected.
pub struct Registrar<H> {
    host: H,
    active: Option<HotkeyBinding>,
}

impl<H: HotkeyHost> Registrar<H> {
    pub fn new(host: H) -> Self {
        Self { host, active: None }
    }

    /// Returns the currently active binding, if any.
    pub fn active(&self) -> Option<HotkeyBinding> {
        self.active
    }

    /// Replaces the active binding with `binding`.
    ///
    /// On conflict the previous binding is re-bound (or none is left
    /// active if there was none, or if the previous one has been claimed
    /// by another process in the meantime) and the error is returned.
    pub fn register(&mut self, binding: HotkeyBinding) -> Result<(), HotkeyError> {
        let previous = self.active.take();
        self.host.unbind(HOTKEY_ID);

        match self.host.bind(HOTKEY_ID, binding) {
            Ok(()) => {
                self.active = Some(binding);
                Ok(())
            }
            Err(e) => {
                if let Some(prev) = previous
                    && self.host.bind(HOTKEY_ID, prev).is_ok()
                {
                    self.active = Some(prev);
                }
                Err(e)
            }
        }
    }

    /// Releases the active binding. Safe to call when nothing is bound.
    pub fn unregister(&mut self) {
        self.host.unbind(HOTKEY_ID);
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records bind/unbind calls and rejects a configurable set of keys.
    struct MockHost {
        calls: Vec<String>,
        bound: Option<HotkeyBinding>,
        conflicts: Vec<u32>,
    }

    impl MockHost {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                bound: None,
                conflicts: Vec::new(),
            }
        }
    }

    impl HotkeyHost for MockHost {
        fn bind(&mut self, id: i32, binding: HotkeyBinding) -> Result<(), HotkeyError> {
            self.calls.push(format!("bind({id}, 0x{:02X})", binding.key));
            if self.conflicts.contains(&binding.key) {
                return Err(HotkeyError::Conflict(binding));
            }
            self.bound = Some(binding);
            Ok(())
        }

        fn unbind(&mut self, id: i32) {
            self.calls.push(format!("unbind({id})"));
            self.bound = None;
        }
    }

    fn binding(modifier: Modifier, key: u32) -> HotkeyBinding {
        HotkeyBinding::new(modifier, key).unwrap()
    }

    #[test]
    fn register_binds_under_fixed_id() {
        let mut reg = Registrar::new(MockHost::new());

        reg.register(binding(Modifier::Ctrl, 0x44)).unwrap();

        assert_eq!(reg.active(), Some(binding(Modifier::Ctrl, 0x44)));
        assert_eq!(reg.host.bound, Some(binding(Modifier::Ctrl, 0x44)));
    }

    #[test]
    fn reregister_leaves_exactly_the_new_binding() {
        let mut reg = Registrar::new(MockHost::new());
        reg.register(binding(Modifier::Ctrl, 0x44)).unwrap();

        reg.register(binding(Modifier::Alt, 0x48)).unwrap();

        // The old binding was released before the new one was bound.
        assert_eq!(
            reg.host.calls,
            vec!["unbind(1)", "bind(1, 0x44)", "unbind(1)", "bind(1, 0x48)"]
        );
        assert_eq!(reg.host.bound, Some(binding(Modifier::Alt, 0x48)));
        assert_eq!(reg.active(), Some(binding(Modifier::Alt, 0x48)));
    }

    #[test]
    fn reregister_works_for_every_modifier() {
        for modifier in [Modifier::Alt, Modifier::Ctrl, Modifier::Shift, Modifier::Win] {
            let mut reg = Registrar::new(MockHost::new());
            reg.register(binding(Modifier::Ctrl, 0x44)).unwrap();

            reg.register(binding(modifier, 0x46)).unwrap();

            assert_eq!(reg.host.bound, Some(binding(modifier, 0x46)));
        }
    }

    #[test]
    fn conflict_restores_previous_binding() {
        let mut host = MockHost::new();
        host.conflicts.push(0x48);
        let mut reg = Registrar::new(host);
        reg.register(binding(Modifier::Ctrl, 0x44)).unwrap();

        let err = reg.register(binding(Modifier::Alt, 0x48));

        assert!(err.is_err());
        assert_eq!(reg.active(), Some(binding(Modifier::Ctrl, 0x44)));
        assert_eq!(reg.host.bound, Some(binding(Modifier::Ctrl, 0x44)));
    }

    #[test]
    fn conflict_with_no_previous_leaves_none_active() {
        let mut host = MockHost::new();
        host.conflicts.push(0x48);
        let mut reg = Registrar::new(host);

        let err = reg.register(binding(Modifier::Alt, 0x48));

        assert!(err.is_err());
        assert_eq!(reg.active(), None);
        assert_eq!(reg.host.bound, None);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut reg = Registrar::new(MockHost::new());

        reg.unregister();
        reg.unregister();

        assert_eq!(reg.active(), None);
    }

    #[test]
    fn modifier_keys_rejected_as_primary_key() {
        assert!(HotkeyBinding::new(Modifier::Ctrl, 0x11).is_none()); // VK_CONTROL
        assert!(HotkeyBinding::new(Modifier::Alt, 0xA0).is_none()); // VK_LSHIFT
        assert!(HotkeyBinding::new(Modifier::Win, 0x5B).is_none()); // VK_LWIN
    }

    #[test]
    fn capture_requires_a_held_modifier() {
        assert_eq!(
            HotkeyBinding::from_capture(0x44, false, false, false, false),
            None
        );
    }

    #[test]
    fn capture_picks_one_modifier_by_priority() {
        let b = HotkeyBinding::from_capture(0x44, true, true, false, false).unwrap();
        assert_eq!(b.modifier, Modifier::Ctrl);

        let b = HotkeyBinding::from_capture(0x44, false, true, true, false).unwrap();
        assert_eq!(b.modifier, Modifier::Alt);
    }

    #[test]
    fn capture_rejects_modifier_as_key() {
        assert_eq!(HotkeyBinding::from_capture(0x10, true, false, false, false), None);
    }

    #[test]
    fn modifier_codes_round_trip() {
        for m in [Modifier::Alt, Modifier::Ctrl, Modifier::Shift, Modifier::Win] {
            assert_eq!(Modifier::from_code(m.code()), Some(m));
        }
        assert_eq!(Modifier::from_code(0), None);
        assert_eq!(Modifier::from_code(0x10), None);
    }
}
