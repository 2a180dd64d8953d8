//! Configuration model: event sources, command targets and binding sets.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Value};

/// Name reserved for the built-in binding-set controller target.
pub const BINDINGS_TARGET: &str = "bindings";

/// Name given to a binding set that does not declare one.
pub const DEFAULT_BINDING_SET: &str = "default";

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Event sources (physical keypads).
    pub keypads: Vec<KeypadDef>,
    /// Command targets.
    pub targets: Vec<TargetDef>,
    /// Named binding sets. The first one is active at startup.
    pub bindings: Vec<BindingSetDef>,
    /// Dispatch loop tuning.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// A configured event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypadDef {
    /// Source name used to qualify keys (`name.key`). Defaults to the source kind.
    #[serde(default)]
    pub name: String,
    /// Source kind and its settings.
    pub source: SourceKind,
}

/// Supported event source kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A keypad attached to a serial port that emits one byte per key press.
    Serial(SerialConfig),
}

impl SourceKind {
    /// Kind name, used as the default source name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Serial(_) => "serial",
        }
    }
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Parity: `N`, `E` or `O`.
    pub parity: String,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    /// Data bits (5-8).
    pub size: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 9600,
            parity: "N".to_string(),
            stop_bits: 1,
            size: 8,
        }
    }
}

/// A configured command target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDef {
    /// Name used in command strings (`name.command`). Defaults to the target kind.
    #[serde(default)]
    pub name: String,
    /// Target kind and its settings.
    pub target: TargetKind,
}

/// Supported command target kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetKind {
    /// OBS Studio controlled over obs-websocket.
    Obs(ObsConfig),
    /// Simulated keyboard input.
    Keyboard(KeyboardConfig),
}

impl TargetKind {
    /// Kind name, used as the default target name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Obs(_) => "obs",
            Self::Keyboard(_) => "keyboard",
        }
    }
}

/// OBS websocket connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsConfig {
    /// Host running OBS.
    pub host: String,
    /// obs-websocket port.
    pub port: u16,
    /// Optional obs-websocket password.
    pub password: Option<String>,
    /// Delay between reconnect attempts (milliseconds).
    pub retry_ms: u64,
    /// Idle time before a liveness probe (milliseconds).
    pub probe_ms: u64,
    /// Maximum wait for a single request reply (milliseconds).
    pub request_timeout_ms: u64,
    /// Fail commands immediately while disconnected instead of queueing them.
    pub fail_when_disconnected: bool,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4444,
            password: None,
            retry_ms: 1000,
            probe_ms: 5000,
            request_timeout_ms: 5000,
            fail_when_disconnected: false,
        }
    }
}

/// Keyboard simulation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Program used to inject key strokes.
    pub program: String,
    /// Release modifiers the user is physically holding before injecting.
    pub clear_modifiers: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            program: "xdotool".to_string(),
            clear_modifiers: true,
        }
    }
}

/// A named set of key bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSetDef {
    /// Set name. Defaults to [`DEFAULT_BINDING_SET`].
    #[serde(default)]
    pub name: String,
    /// Key to command-list mappings.
    pub bindings: Vec<BindingDef>,
}

impl BindingSetDef {
    /// Name with the default applied.
    pub fn effective_name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_BINDING_SET
        } else {
            &self.name
        }
    }
}

/// One or more keys mapped to an ordered list of commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDef {
    /// Key identifiers, either bare (`"A"`) or source-qualified (`"kp1.A"`).
    pub keys: Vec<String>,
    /// Commands run in order when one of the keys is pressed.
    pub commands: Vec<Invocation>,
}

/// A single `target.command(params...)` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Command string in `target.command` form.
    pub command: String,
    /// Ordered parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Invocation {
    /// Build an invocation from a command string and parameters.
    pub fn new(command: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    /// Split the command string into `(target, command)`.
    pub fn split(&self) -> Option<(&str, &str)> {
        let (target, command) = self.command.split_once('.')?;
        if target.is_empty() || command.is_empty() {
            return None;
        }
        Some((target, command))
    }
}

/// Dispatch loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of events processed concurrently.
    pub max_inflight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_inflight: 64 }
    }
}

impl KeypadDef {
    /// Name with the default applied.
    pub fn effective_name(&self) -> &str {
        if self.name.is_empty() {
            self.source.kind_name()
        } else {
            &self.name
        }
    }
}

impl TargetDef {
    /// Name with the default applied.
    pub fn effective_name(&self) -> &str {
        if self.name.is_empty() {
            self.target.kind_name()
        } else {
            &self.name
        }
    }
}

impl Config {
    /// Check structural invariants that do not require live targets.
    pub fn validate(&self) -> Result<(), Error> {
        if self.keypads.is_empty() || self.targets.is_empty() || self.bindings.is_empty() {
            return Err(Error::validation(
                "at least one keypad, one target and one binding set must be configured",
            ));
        }
        if self.dispatch.max_inflight == 0 {
            return Err(Error::validation("dispatch.max_inflight must be positive"));
        }

        unique("keypad", self.keypads.iter().map(KeypadDef::effective_name))?;
        unique("target", self.targets.iter().map(TargetDef::effective_name))?;
        unique(
            "binding set",
            self.bindings.iter().map(BindingSetDef::effective_name),
        )?;

        if self
            .targets
            .iter()
            .any(|t| t.effective_name() == BINDINGS_TARGET)
        {
            return Err(Error::validation(format!(
                "target name '{BINDINGS_TARGET}' is reserved"
            )));
        }

        for set in &self.bindings {
            for (idx, binding) in set.bindings.iter().enumerate() {
                if binding.keys.is_empty() {
                    return Err(Error::validation(format!(
                        "binding set '{}': binding #{} has no keys",
                        set.effective_name(),
                        idx + 1
                    )));
                }
                if binding.commands.is_empty() {
                    return Err(Error::validation(format!(
                        "binding set '{}': binding for {:?} has no commands",
                        set.effective_name(),
                        binding.keys
                    )));
                }
                if let Some(bad) = binding.commands.iter().find(|c| c.split().is_none()) {
                    return Err(Error::validation(format!(
                        "binding set '{}': command '{}' is not of the form target.command",
                        set.effective_name(),
                        bad.command
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fail on the first repeated name.
fn unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::validation(format!("duplicate {what} name '{name}'")));
        }
    }
    Ok(())
}
