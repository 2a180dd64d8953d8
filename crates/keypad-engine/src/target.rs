//! The command target contract.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{Result, Value};

/// Reserved target name for the binding-set controller.
pub const BINDINGS_TARGET: &str = config::BINDINGS_TARGET;

/// An endpoint that validates and executes named commands.
///
/// Construction plays the role of initialisation: a target is usable as soon
/// as it exists, and network-backed targets connect in the background.
/// `check` is called once per bound command before any event is dispatched;
/// `execute` may therefore assume a valid parameter shape, but must still
/// validate runtime state.
#[async_trait]
pub trait CommandTarget: Send + Sync {
    /// Validate a command name and its parameters.
    fn check(&self, command: &str, params: &[Value]) -> Result<()>;

    /// Run a command.
    async fn execute(&self, command: &str, params: &[Value]) -> Result<()>;

    /// Release held resources. Must be idempotent.
    async fn close(&self) {}
}

/// A resolved reference to a target in the controller's target set.
///
/// The binding registry is a target of its own bindings; it is addressed by
/// the [`TargetRef::Bindings`] tag instead of a stored pointer.
#[derive(Clone)]
pub enum TargetRef {
    /// The binding registry itself.
    Bindings,
    /// Any other target.
    External {
        /// Configured target name.
        name: String,
        /// Shared handle to the target.
        target: Arc<dyn CommandTarget>,
    },
}

impl TargetRef {
    /// Target name as written in command strings.
    pub fn name(&self) -> &str {
        match self {
            Self::Bindings => BINDINGS_TARGET,
            Self::External { name, .. } => name,
        }
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bindings => f.write_str("Bindings"),
            Self::External { name, .. } => f.debug_tuple("External").field(name).finish(),
        }
    }
}
