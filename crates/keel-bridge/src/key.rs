//! Input key codes shared with the host.
//!
//! Ordinals follow declaration order and are read by the host as raw
//! integers. Inserting, removing or reordering a variant silently changes
//! what the host sees, so new codes may only ever be appended, and the
//! regression test at the bottom of this file pins the current table.

use std::fmt;

/// Which device family a [`KeyCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCategory {
    Keyboard,
    Mouse,
    Gamepad,
}

macro_rules! key_codes {
    ($($variant:ident),+ $(,)?) => {
        /// Keyboard, mouse-button and gamepad-button identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum KeyCode {
            $($variant),+
        }

        impl KeyCode {
            /// Every key code, indexed by ordinal.
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$variant),+];

            /// The declared name of this key code.
            pub const fn name(self) -> &'static str {
                match self {
                    $(KeyCode::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

key_codes! {
    // Keyboard: function keys
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12, F13, F14, F15,
    // Keyboard: number row
    Alpha0, Alpha1, Alpha2, Alpha3, Alpha4, Alpha5, Alpha6, Alpha7, Alpha8, Alpha9,
    // Keyboard: keypad
    Keypad0, Keypad1, Keypad2, Keypad3, Keypad4, Keypad5, Keypad6, Keypad7, Keypad8, Keypad9,
    // Keyboard: letters, row by row
    Q, W, E, R, T, Y, U, I, O, P,
    A, S, D, F, G, H, J, K, L,
    Z, X, C, V, B, N, M,
    // Keyboard: controls
    Esc, Tab, ShiftLeft, ShiftRight, CtrlLeft, CtrlRight, AltLeft, AltRight,
    Space, CapsLock, Backspace, Enter, Delete,
    ArrowLeft, ArrowRight, ArrowUp, ArrowDown,
    PageUp, PageDown, Home, End, Insert,
    // Mouse
    ClickLeft, ClickMiddle, ClickRight,
    // Gamepad
    DPadUp, DPadDown, DPadLeft, DPadRight,
    ButtonA, ButtonB, ButtonX, ButtonY,
    Back, Guide, Start,
    LeftStick, RightStick, LeftShoulder, RightShoulder,
    Misc1, Paddle1, Paddle2, Paddle3, Paddle4, Touchpad,
}

impl KeyCode {
    /// Number of declared key codes.
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    /// Decode an ordinal received from the other side of the boundary.
    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    pub const fn category(self) -> KeyCategory {
        let ordinal = self as u32;
        if ordinal >= KeyCode::DPadUp as u32 {
            KeyCategory::Gamepad
        } else if ordinal >= KeyCode::ClickLeft as u32 {
            KeyCategory::Mouse
        } else {
            KeyCategory::Keyboard
        }
    }

    /// `(name, ordinal)` for every key code, in ordinal order.
    pub fn ordinal_table() -> Vec<(&'static str, u32)> {
        Self::ALL.iter().map(|k| (k.name(), k.ordinal())).collect()
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// The published ordinal table. Changing this list is an ABI break.
    const PINNED: &[&str] = &[
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "F13", "F14",
        "F15", "Alpha0", "Alpha1", "Alpha2", "Alpha3", "Alpha4", "Alpha5", "Alpha6", "Alpha7",
        "Alpha8", "Alpha9", "Keypad0", "Keypad1", "Keypad2", "Keypad3", "Keypad4", "Keypad5",
        "Keypad6", "Keypad7", "Keypad8", "Keypad9", "Q", "W", "E", "R", "T", "Y", "U", "I", "O",
        "P", "A", "S", "D", "F", "G", "H", "J", "K", "L", "Z", "X", "C", "V", "B", "N", "M",
        "Esc", "Tab", "ShiftLeft", "ShiftRight", "CtrlLeft", "CtrlRight", "AltLeft", "AltRight",
        "Space", "CapsLock", "Backspace", "Enter", "Delete", "ArrowLeft", "ArrowRight",
        "ArrowUp", "ArrowDown", "PageUp", "PageDown", "Home", "End", "Insert", "ClickLeft",
        "ClickMiddle", "ClickRight", "DPadUp", "DPadDown", "DPadLeft", "DPadRight", "ButtonA",
        "ButtonB", "ButtonX", "ButtonY", "Back", "Guide", "Start", "LeftStick", "RightStick",
        "LeftShoulder", "RightShoulder", "Misc1", "Paddle1", "Paddle2", "Paddle3", "Paddle4",
        "Touchpad",
    ];

    #[test]
    fn ordinal_table_matches_published_table() {
        let table = KeyCode::ordinal_table();
        assert_eq!(table.len(), PINNED.len());
        for (i, (name, ordinal)) in table.iter().enumerate() {
            assert_eq!(*ordinal as usize, i, "ordinals must be contiguous from 0");
            assert_eq!(*name, PINNED[i], "key at ordinal {i} moved");
        }
    }

    #[test]
    fn well_known_ordinals() {
        assert_eq!(KeyCode::F1.ordinal(), 0);
        assert_eq!(KeyCode::Space.ordinal(), 69);
        assert_eq!(KeyCode::ClickLeft.ordinal(), 83);
        assert_eq!(KeyCode::DPadUp.ordinal(), 86);
        assert_eq!(KeyCode::Touchpad.ordinal(), 106);
        assert_eq!(KeyCode::COUNT, 107);
    }

    #[test]
    fn categories_split_at_device_boundaries() {
        assert_eq!(KeyCode::Insert.category(), KeyCategory::Keyboard);
        assert_eq!(KeyCode::ClickLeft.category(), KeyCategory::Mouse);
        assert_eq!(KeyCode::ClickRight.category(), KeyCategory::Mouse);
        assert_eq!(KeyCode::DPadUp.category(), KeyCategory::Gamepad);
        assert_eq!(KeyCode::Touchpad.category(), KeyCategory::Gamepad);
    }

    #[test]
    fn from_ordinal_rejects_unknown_values() {
        assert_eq!(KeyCode::from_ordinal(69), Some(KeyCode::Space));
        assert_eq!(KeyCode::from_ordinal(KeyCode::COUNT as u32), None);
        assert_eq!(KeyCode::from_ordinal(u32::MAX), None);
    }
}
