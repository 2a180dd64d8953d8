use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the keypad engine and its targets.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is structurally unusable (missing sections, duplicate names).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A binding referenced a target that is not configured.
    #[error("Unknown target '{0}'")]
    UnknownTarget(String),

    /// A command name is not present in the target's command table.
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// A binding set name is not configured.
    #[error("Unknown binding set '{0}'")]
    UnknownBindingSet(String),

    /// A bound command failed resolution or check while building the registry.
    #[error("Binding set '{set}': command '{command}': {source}")]
    Binding {
        /// Binding set containing the command.
        set: String,
        /// Full `target.command` string.
        command: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Parameters do not match the command's declared shape.
    #[error("Invalid parameters for '{command}': {reason}")]
    InvalidParameters {
        /// Command name as looked up.
        command: String,
        /// What was wrong.
        reason: String,
    },

    /// The target reported a failure while executing a command.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Talking to a network-backed target failed.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The target is not connected and does not queue commands.
    #[error("Target '{0}' is not connected")]
    NotConnected(String),

    /// The target's command queue has shut down.
    #[error("Command channel closed")]
    ChannelClosed,

    /// I/O failure while performing a system operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors that can only arise while building from configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownTarget(_)
                | Self::UnknownCommand(_)
                | Self::UnknownBindingSet(_)
                | Self::Binding { .. }
                | Self::InvalidParameters { .. }
        )
    }
}

impl From<config::Error> for Error {
    fn from(e: config::Error) -> Self {
        Self::Config(e.pretty())
    }
}
