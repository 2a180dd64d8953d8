//! Key and modifier names accepted by `keypress`, and their X keysyms.

use std::fmt;

// Key spec to X keysym. Keys are case-sensitive.
macro_rules! key_table {
    ( $( $spec:literal => $sym:literal, )* ) => {
        /// X keysym for a key spec.
        pub fn keysym(spec: &str) -> Option<&'static str> {
            match spec {
                $( $spec => Some($sym), )*
                _ => None,
            }
        }

        /// Every accepted key spec.
        pub const KEY_NAMES: &[&str] = &[ $( $spec, )* ];
    };
}

key_table! {
    "0" => "0", "1" => "1", "2" => "2", "3" => "3", "4" => "4",
    "5" => "5", "6" => "6", "7" => "7", "8" => "8", "9" => "9",
    "A" => "a", "B" => "b", "C" => "c", "D" => "d", "E" => "e",
    "F" => "f", "G" => "g", "H" => "h", "I" => "i", "J" => "j",
    "K" => "k", "L" => "l", "M" => "m", "N" => "n", "O" => "o",
    "P" => "p", "Q" => "q", "R" => "r", "S" => "s", "T" => "t",
    "U" => "u", "V" => "v", "W" => "w", "X" => "x", "Y" => "y",
    "Z" => "z",
    "space" => "space",
    "backspace" => "BackSpace",
    "up" => "Up",
    "down" => "Down",
    "left" => "Left",
    "right" => "Right",
    "enter" => "Return",
    "esc" => "Escape",
    "F1" => "F1", "F2" => "F2", "F3" => "F3", "F4" => "F4",
    "F5" => "F5", "F6" => "F6", "F7" => "F7", "F8" => "F8",
    "F9" => "F9", "F10" => "F10", "F11" => "F11", "F12" => "F12",
}

/// Modifier keys held while a key is pressed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    /// Left control.
    Ctrl,
    /// Left alt.
    Alt,
    /// Left shift.
    Shift,
    /// Right control.
    RightCtrl,
    /// Right shift.
    RightShift,
    /// AltGr (ISO level 3 shift).
    AltGr,
    /// Super / Windows key.
    Super,
}

impl Modifier {
    /// Every modifier, in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Ctrl,
        Self::Alt,
        Self::Shift,
        Self::RightCtrl,
        Self::RightShift,
        Self::AltGr,
        Self::Super,
    ];

    /// Parse a modifier spec such as `ctrl` or `right-shift`.
    pub fn from_spec(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.to_spec() == s)
    }

    /// Spec string for this modifier.
    pub fn to_spec(self) -> &'static str {
        match self {
            Self::Ctrl => "ctrl",
            Self::Alt => "alt",
            Self::Shift => "shift",
            Self::RightCtrl => "right-ctrl",
            Self::RightShift => "right-shift",
            Self::AltGr => "altgr",
            Self::Super => "super",
        }
    }

    /// X keysym for this modifier.
    pub fn keysym(self) -> &'static str {
        match self {
            Self::Ctrl => "Control_L",
            Self::Alt => "Alt_L",
            Self::Shift => "Shift_L",
            Self::RightCtrl => "Control_R",
            Self::RightShift => "Shift_R",
            Self::AltGr => "ISO_Level3_Shift",
            Self::Super => "Super_L",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_spec())
    }
}
