//! Virtual keyboard target.
//!
//! Exposes a single `keypress(key, modifiers...)` command that presses a key
//! chord on the local X display. Keys and modifiers are checked against fixed
//! tables when bindings are loaded, so a running keypad never sends an
//! unknown key name to the injector.

mod chord;
mod inject;
mod keys;

use std::result::Result as StdResult;

use async_trait::async_trait;
use config::KeyboardConfig;
use futures::future::BoxFuture;
use keypad_engine::{CommandDef, CommandTable, CommandTarget, Error, Result, Value};
use tracing::debug;

pub use chord::Chord;
pub use inject::{Injector, XdotoolInjector};
pub use keys::{KEY_NAMES, Modifier, keysym};

/// Keyboard target driven by an [`Injector`].
pub struct KeyboardTarget<I = XdotoolInjector> {
    /// Backend that performs the key press.
    injector: I,
    /// Command routing.
    table: CommandTable<Self>,
}

impl KeyboardTarget<XdotoolInjector> {
    /// Build an xdotool-backed target from settings.
    pub fn from_config(cfg: &KeyboardConfig) -> Result<Self> {
        Self::new(XdotoolInjector::new(cfg))
    }
}

impl<I: Injector> KeyboardTarget<I> {
    /// Build a target around `injector`.
    pub fn new(injector: I) -> Result<Self> {
        let table = CommandTable::new([CommandDef::new(
            "keypress",
            check_keypress,
            exec_keypress::<I>,
        )])?;
        Ok(Self { injector, table })
    }

    /// The injection backend.
    pub fn injector(&self) -> &I {
        &self.injector
    }
}

/// Bind-time check for `keypress`.
fn check_keypress(params: &[Value]) -> StdResult<(), String> {
    Chord::from_params(params).map(|_| ())
}

/// Press the chord described by `params`.
fn exec_keypress<'a, I: Injector>(
    t: &'a KeyboardTarget<I>,
    params: &'a [Value],
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let chord = Chord::from_params(params).map_err(|reason| Error::InvalidParameters {
            command: "keypress".to_string(),
            reason,
        })?;
        debug!(%chord, "keypress");
        t.injector.press(&chord).await
    })
}

#[async_trait]
impl<I: Injector> CommandTarget for KeyboardTarget<I> {
    fn check(&self, command: &str, params: &[Value]) -> Result<()> {
        self.table.check(command, params)
    }

    async fn execute(&self, command: &str, params: &[Value]) -> Result<()> {
        self.table.execute(self, command, params).await
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        /// Chords in press order.
        pressed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Injector for Recorder {
        async fn press(&self, chord: &Chord) -> Result<()> {
            self.pressed.lock().push(chord.to_string());
            Ok(())
        }
    }

    fn strs(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    #[test]
    fn check_validates_chords() {
        let t = KeyboardTarget::new(Recorder::default()).unwrap();
        t.check("keypress", &strs(&["A", "ctrl"])).unwrap();
        t.check("KeyPress", &strs(&["F1"])).unwrap();
        assert!(matches!(
            t.check("keypress", &[]),
            Err(Error::InvalidParameters { .. })
        ));
        assert!(matches!(
            t.check("keypress", &strs(&["A", "hyper"])),
            Err(Error::InvalidParameters { .. })
        ));
        assert!(matches!(
            t.check("keypress", &[Value::Number(1.0)]),
            Err(Error::InvalidParameters { .. })
        ));
        assert!(matches!(
            t.check("type", &strs(&["A"])),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[tokio::test]
    async fn execute_presses_chord() {
        let t = KeyboardTarget::new(Recorder::default()).unwrap();
        t.execute("keypress", &strs(&["S", "shift", "ctrl"]))
            .await
            .unwrap();
        t.execute("keypress", &strs(&["enter"])).await.unwrap();
        assert_eq!(
            *t.injector().pressed.lock(),
            vec!["ctrl+shift+S".to_string(), "enter".to_string()]
        );
    }
}
