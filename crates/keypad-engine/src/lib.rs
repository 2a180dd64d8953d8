//! Keypad Engine
//!
//! Routes key presses from event sources to commands on pluggable targets.
//!
//! - [`CommandTable`]: case-insensitive name to behaviour routing for one target type
//! - [`CommandTarget`]: the contract every controllable endpoint implements
//! - [`ReconnectingTarget`]: serialises commands onto a session that reconnects on its own
//! - [`BindingRegistry`]: named binding sets with an active set and cyclic switching
//! - [`Controller`] and [`Dispatcher`]: validate bindings at startup, then resolve and run events
//!
//! Everything is built once from configuration. After that the only mutable
//! shared state is the name of the active binding set.

mod bindings;
pub mod command;
mod controller;
mod cycle;
mod dispatch;
mod error;
mod reconnect;
mod source;
mod target;
pub mod test_support;

pub use bindings::{ActionList, BindingAction, BindingRegistry, BindingSet, ControlCommands};
pub use command::{CommandDef, CommandTable};
pub use config::Value;
pub use controller::{Controller, ControllerBuilder, DEFAULT_MAX_INFLIGHT, SHUTDOWN_GRACE};
pub use cycle::{Step, cycle};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{Error, Result};
pub use reconnect::{
    Connector, LinkState, PROBE_INTERVAL, RETRY_INTERVAL, ReconnectPolicy, ReconnectingTarget,
    Session,
};
pub use source::{Event, EventSource};
pub use target::{BINDINGS_TARGET, CommandTarget, TargetRef};
