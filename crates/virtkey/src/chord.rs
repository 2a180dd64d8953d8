//! Key chords parsed from `keypress` parameters.

use std::fmt;

use keypad_engine::{Value, command::expect_str};

use crate::keys::{KEY_NAMES, Modifier, keysym};

/// A key plus the modifiers held while pressing it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chord {
    /// Modifiers, deduplicated, in canonical order.
    pub modifiers: Vec<Modifier>,
    /// Key spec, e.g. `A` or `F5`.
    pub key: &'static str,
}

impl Chord {
    /// Parse `keypress` parameters: a key followed by zero or more modifiers.
    pub fn from_params(params: &[Value]) -> Result<Self, String> {
        if params.is_empty() {
            return Err("expected a key and optional modifiers".to_string());
        }
        let spec = expect_str(params, 0)?;
        let key = KEY_NAMES
            .iter()
            .copied()
            .find(|k| *k == spec)
            .ok_or_else(|| format!("unknown key '{spec}'"))?;
        let mut modifiers = Vec::new();
        for idx in 1..params.len() {
            let spec = expect_str(params, idx)?;
            let m = Modifier::from_spec(spec).ok_or_else(|| format!("unknown modifier '{spec}'"))?;
            if !modifiers.contains(&m) {
                modifiers.push(m);
            }
        }
        modifiers.sort();
        Ok(Self { modifiers, key })
    }

    /// The xdotool key argument, e.g. `Control_L+Shift_L+a`.
    pub fn to_xdotool(&self) -> String {
        let mut parts: Vec<&str> = self.modifiers.iter().map(|m| m.keysym()).collect();
        parts.push(keysym(self.key).unwrap_or(self.key));
        parts.join("+")
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{m}+")?;
        }
        f.write_str(self.key)
    }
}
