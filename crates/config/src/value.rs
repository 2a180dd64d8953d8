//! Command parameter values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parameter passed to a target command.
///
/// Parameters are decoded once when the configuration is loaded. Integers in
/// the source are widened to [`Value::Number`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Free-form string.
    Str(String),
}

impl Value {
    /// Borrow the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric payload, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mixed_list() {
        let vals: Vec<Value> = ron::from_str(r#"["Scene 1", 3, 2.5, true]"#).unwrap();
        assert_eq!(
            vals,
            vec![
                Value::from("Scene 1"),
                Value::Number(3.0),
                Value::Number(2.5),
                Value::Bool(true),
            ]
        );
        assert_eq!(vals[0].as_str(), Some("Scene 1"));
        assert_eq!(vals[1].as_str(), None);
        assert_eq!(vals[2].as_f64(), Some(2.5));
        assert_eq!(vals[0].as_f64(), None);
        assert_eq!(vals[3].as_bool(), Some(true));
        assert_eq!(vals[1].as_bool(), None);
        assert_eq!(vals[3].kind(), "boolean");
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::Number(4.0).to_string(), "4");
    }
}
