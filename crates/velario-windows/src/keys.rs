//! Virtual-key code naming for the tooltip and the capture dialog.
//!
//! Covers letters, digits, function keys, and the named keys a user
//! can plausibly bind. Unknown codes fall back to a hex spelling so
//! the tooltip never shows nothing.

/// Named non-alphanumeric keys, VK code to display name.
const NAMED_KEYS: &[(u32, &str)] = &[
    (0x08, "Backspace"),
    (0x09, "Tab"),
    (0x0D, "Enter"),
    (0x1B, "Esc"),
    (0x20, "Space"),
    (0x21, "PageUp"),
    (0x22, "PageDown"),
    (0x23, "End"),
    (0x24, "Home"),
    (0x25, "Left"),
    (0x26, "Up"),
    (0x27, "Right"),
    (0x28, "Down"),
    (0x2D, "Insert"),
    (0x2E, "Delete"),
    (0xBA, "Semicolon"),
    (0xBB, "Plus"),
    (0xBC, "Comma"),
    (0xBD, "Minus"),
    (0xBE, "Period"),
    (0xBF, "Slash"),
    (0xC0, "Backtick"),
    (0xDB, "LBracket"),
    (0xDC, "Backslash"),
    (0xDD, "RBracket"),
    (0xDE, "Quote"),
];

/// Returns the display name for a virtual-key code.
pub fn name_from_vk(vk: u32) -> String {
    // Letters and digits map straight to their character.
    if (0x30..=0x39).contains(&vk) || (0x41..=0x5A).contains(&vk) {
        return char::from(vk as u8).to_string();
    }

    // F1–F24 (VK_F1 = 0x70).
    if (0x70..=0x87).contains(&vk) {
        return format!("F{}", vk - 0x6F);
    }

    if let Some((_, name)) = NAMED_KEYS.iter().find(|(code, _)| *code == vk) {
        return (*name).to_string();
    }

    format!("0x{vk:02X}")
}

/// Resolves a display name back to a virtual-key code.
/// Matching is case-insensitive. Returns `None` for unknown names.
pub fn vk_from_name(name: &str) -> Option<u32> {
    let upper = name.to_ascii_uppercase();

    if upper.len() == 1 {
        let ch = upper.as_bytes()[0];
        if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
            return Some(u32::from(ch));
        }
    }

    if let Some(rest) = upper.strip_prefix('F')
        && let Ok(n) = rest.parse::<u32>()
        && (1..=24).contains(&n)
    {
        return Some(0x70 + n - 1);
    }

    NAMED_KEYS
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(&upper))
        .map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_name_themselves() {
        assert_eq!(name_from_vk(0x44), "D");
        assert_eq!(name_from_vk(0x5A), "Z");
        assert_eq!(name_from_vk(0x30), "0");
        assert_eq!(name_from_vk(0x39), "9");
    }

    #[test]
    fn function_keys() {
        assert_eq!(name_from_vk(0x70), "F1");
        assert_eq!(name_from_vk(0x7B), "F12");
    }

    #[test]
    fn named_keys_round_trip() {
        for &(vk, name) in NAMED_KEYS {
            assert_eq!(name_from_vk(vk), name);
            assert_eq!(vk_from_name(name), Some(vk));
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_hex() {
        assert_eq!(name_from_vk(0xFF), "0xFF");
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(vk_from_name("d"), Some(0x44));
        assert_eq!(vk_from_name("SPACE"), Some(0x20));
        assert_eq!(vk_from_name("esc"), Some(0x1B));
        assert_eq!(vk_from_name("f12"), Some(0x7B));
    }

    #[test]
    fn unknown_names_return_none() {
        assert_eq!(vk_from_name("INVALID"), None);
        assert_eq!(vk_from_name(""), None);
    }
}
