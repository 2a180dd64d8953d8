//! Parse and load user configuration.

use std::{ffi::OsStr, fs, path::Path};

use ron::{Options, extensions::Extensions};
use tracing::debug;

use crate::{Config, Error, error::excerpt_at};

/// RON options shared by every configuration parse.
fn options() -> Options {
    Options::default()
        .with_default_extension(Extensions::UNWRAP_NEWTYPES)
        .with_default_extension(Extensions::UNWRAP_VARIANT_NEWTYPES)
        .with_default_extension(Extensions::IMPLICIT_SOME)
}

/// Load and validate a `Config` from a RON file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config, Error> {
    if path.extension() != Some(OsStr::new("ron")) {
        return Err(Error::Read {
            path: Some(path.to_path_buf()),
            message: "Unsupported config format (expected a .ron file)".to_string(),
        });
    }
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), bytes = source.len(), "config_read");
    load_from_str(&source).map_err(|e| e.with_path(path))
}

/// Parse and validate a `Config` from RON text.
pub fn load_from_str(source: &str) -> Result<Config, Error> {
    let config: Config = options().from_str(source).map_err(|e| {
        let rendered = e.to_string();
        let (line, col) = error_location(&rendered).unwrap_or((1, 1));
        Error::Parse {
            path: None,
            line,
            col,
            message: rendered,
            excerpt: excerpt_at(source, line, col),
        }
    })?;
    config.validate()?;
    Ok(config)
}

/// Extract the leading `line:col` from a rendered RON error.
fn error_location(rendered: &str) -> Option<(usize, usize)> {
    let head = rendered.split([' ', '-']).next()?;
    let mut parts = head.trim_end_matches(':').split(':');
    let line = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    Some((line, col))
}
