//! Key stroke injection backends.

use async_trait::async_trait;
use config::KeyboardConfig;
use keypad_engine::{Error, Result};
use tokio::process::Command;
use tracing::trace;

use crate::Chord;

/// Something that can press a chord on the local display.
#[async_trait]
pub trait Injector: Send + Sync + 'static {
    /// Press and release `chord`.
    async fn press(&self, chord: &Chord) -> Result<()>;
}

/// Injects key strokes by running `xdotool key`.
#[derive(Debug, Clone)]
pub struct XdotoolInjector {
    /// Program to run.
    program: String,
    /// Pass `--clearmodifiers`.
    clear_modifiers: bool,
}

impl XdotoolInjector {
    /// Build from keyboard settings.
    pub fn new(cfg: &KeyboardConfig) -> Self {
        Self {
            program: cfg.program.clone(),
            clear_modifiers: cfg.clear_modifiers,
        }
    }

    /// Arguments passed to the program for `chord`.
    pub fn args(&self, chord: &Chord) -> Vec<String> {
        let mut args = vec!["key".to_string()];
        if self.clear_modifiers {
            args.push("--clearmodifiers".to_string());
        }
        args.push(chord.to_xdotool());
        args
    }
}

#[async_trait]
impl Injector for XdotoolInjector {
    async fn press(&self, chord: &Chord) -> Result<()> {
        let args = self.args(chord);
        trace!(program = %self.program, ?args, "inject");
        let out = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Execution(format!("failed to run {}: {e}", self.program)))?;
        if out.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(Error::Execution(format!(
            "{} exited with {}: {}",
            self.program,
            out.status,
            stderr.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use keypad_engine::Value;

    use super::*;

    fn chord(items: &[&str]) -> Chord {
        let params: Vec<Value> = items.iter().map(|s| Value::from(*s)).collect();
        Chord::from_params(&params).unwrap()
    }

    #[test]
    fn builds_xdotool_arguments() {
        let inj = XdotoolInjector::new(&KeyboardConfig::default());
        assert_eq!(
            inj.args(&chord(&["F5", "alt"])),
            vec!["key", "--clearmodifiers", "Alt_L+F5"]
        );
        let plain = XdotoolInjector::new(&KeyboardConfig {
            clear_modifiers: false,
            ..KeyboardConfig::default()
        });
        assert_eq!(plain.args(&chord(&["space"])), vec!["key", "space"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_maps_to_result() {
        let ok = XdotoolInjector::new(&KeyboardConfig {
            program: "true".to_string(),
            clear_modifiers: true,
        });
        ok.press(&chord(&["A"])).await.unwrap();

        let failing = XdotoolInjector::new(&KeyboardConfig {
            program: "false".to_string(),
            clear_modifiers: true,
        });
        assert!(matches!(
            failing.press(&chord(&["A"])).await,
            Err(Error::Execution(_))
        ));

        let missing = XdotoolInjector::new(&KeyboardConfig {
            program: "/nonexistent/xdotool".to_string(),
            clear_modifiers: true,
        });
        let err = missing.press(&chord(&["A"])).await.unwrap_err();
        assert!(err.to_string().contains("failed to run"), "{err}");
    }
}
