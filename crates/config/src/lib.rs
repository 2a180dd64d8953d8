//! Configuration model and RON loader for keypad.
//!
//! A configuration names the event sources to read, the command targets to
//! drive, and one or more binding sets that map keys to target commands.

use std::{
    env,
    path::{Path, PathBuf},
};

mod error;
mod loader;
mod types;
mod value;

#[cfg(test)]
mod test_parse;

pub use error::Error;
pub use loader::{load_from_path, load_from_str};
pub use types::{
    BINDINGS_TARGET, BindingDef, BindingSetDef, Config, DEFAULT_BINDING_SET, DispatchConfig,
    Invocation, KeyboardConfig, KeypadDef, ObsConfig, SerialConfig, SourceKind, TargetDef,
    TargetKind,
};
pub use value::Value;

/// Determine the preferred user config path (`~/.keypad.ron`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".keypad.ron");
    p
}

/// Resolve the effective config path.
///
/// Policy:
/// 1) Use `explicit` when provided.
/// 2) Else use `~/.keypad.ron` when it exists.
/// 3) Else return a "no config found" error pointing to `demos/complete.ron`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let preferred = default_config_path();
    if preferred.exists() {
        return Ok(preferred);
    }

    Err(Error::Read {
        path: Some(preferred),
        message: "No config found. Create ~/.keypad.ron or copy demos/complete.ron".to_string(),
    })
}
