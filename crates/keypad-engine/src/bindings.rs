//! Binding sets and the registry that tracks which one is active.

use std::{collections::HashMap, mem, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::info;

use crate::{
    CommandTarget, Error, Result, Value,
    command::{self, CommandDef, CommandTable},
    cycle::{Step, cycle},
    source::Event,
    target::TargetRef,
};

/// A validated command bound to a key.
#[derive(Debug, Clone)]
pub struct BindingAction {
    /// Target that runs the command.
    pub target: TargetRef,
    /// Command name within the target.
    pub command: String,
    /// Parameters passed on every run.
    pub params: Vec<Value>,
}

/// Ordered actions shared by every key bound to them.
pub type ActionList = Arc<[BindingAction]>;

/// A named key to action-list mapping.
#[derive(Debug, Clone)]
pub struct BindingSet {
    /// Set name.
    pub name: String,
    /// Bare or source-qualified key to actions.
    pub keys: HashMap<String, ActionList>,
}

impl BindingSet {
    /// Actions for `event`, preferring the source-qualified key.
    pub fn lookup(&self, event: &Event) -> Option<ActionList> {
        self.keys
            .get(&event.qualified_key())
            .or_else(|| self.keys.get(&event.key))
            .cloned()
    }
}

/// The `activate`, `next` and `previous` commands, plus the set names they accept.
///
/// Exists before the registry so bindings that target `bindings.*` can be
/// checked while the registry is still being assembled.
#[derive(Debug)]
pub struct ControlCommands {
    /// Command table run against the registry.
    table: CommandTable<BindingRegistry>,
    /// Set names in configuration order.
    order: Vec<String>,
}

impl ControlCommands {
    /// Build control commands for the given set names.
    pub fn new(order: Vec<String>) -> Result<Self> {
        let table = CommandTable::new([
            CommandDef::new("activate", command::single_str, exec_activate),
            CommandDef::new("next", command::no_params, exec_next),
            CommandDef::new("previous", command::no_params, exec_previous),
        ])?;
        Ok(Self { table, order })
    }

    /// Check a control command, including that an activation target exists.
    pub fn check(&self, name: &str, params: &[Value]) -> Result<()> {
        self.table.check(name, params)?;
        if name.eq_ignore_ascii_case("activate")
            && let Some(set) = params.first().and_then(Value::as_str)
            && !self.order.iter().any(|n| n == set)
        {
            return Err(Error::UnknownBindingSet(set.to_string()));
        }
        Ok(())
    }
}

/// Body of `bindings.activate(name)`.
fn exec_activate<'a>(reg: &'a BindingRegistry, params: &'a [Value]) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let name = command::expect_str(params, 0).map_err(|reason| Error::InvalidParameters {
            command: "activate".to_string(),
            reason,
        })?;
        reg.activate(name).map(|_| ())
    })
}

/// Body of `bindings.next()`.
fn exec_next<'a>(reg: &'a BindingRegistry, _params: &'a [Value]) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move { reg.next().map(|_| ()) })
}

/// Body of `bindings.previous()`.
fn exec_previous<'a>(reg: &'a BindingRegistry, _params: &'a [Value]) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move { reg.previous().map(|_| ()) })
}

/// All binding sets and the name of the active one.
///
/// The set contents never change after construction. Only the active name
/// does, and every read or write of it happens under one lock.
#[derive(Debug)]
pub struct BindingRegistry {
    /// Sets by name.
    sets: HashMap<String, BindingSet>,
    /// Control commands; also holds the cyclic order of set names.
    control: ControlCommands,
    /// Name of the active set.
    active: Mutex<String>,
}

impl BindingRegistry {
    /// Assemble a registry. The first set in `control`'s order starts active.
    pub fn new(sets: Vec<BindingSet>, control: ControlCommands) -> Result<Self> {
        let first = control
            .order
            .first()
            .cloned()
            .ok_or_else(|| Error::Config("no binding sets configured".to_string()))?;
        let sets: HashMap<String, BindingSet> =
            sets.into_iter().map(|s| (s.name.clone(), s)).collect();
        if sets.len() != control.order.len()
            || control.order.iter().any(|n| !sets.contains_key(n))
        {
            return Err(Error::Config(
                "binding set order does not match the configured sets".to_string(),
            ));
        }
        Ok(Self {
            sets,
            control,
            active: Mutex::new(first),
        })
    }

    /// Name of the active set.
    pub fn active(&self) -> String {
        self.active.lock().clone()
    }

    /// Set names in cyclic order.
    pub fn order(&self) -> &[String] {
        &self.control.order
    }

    /// Make `name` the active set. Returns whether the active set changed.
    pub fn activate(&self, name: &str) -> Result<bool> {
        if !self.sets.contains_key(name) {
            return Err(Error::UnknownBindingSet(name.to_string()));
        }
        let mut active = self.active.lock();
        if *active == name {
            return Ok(false);
        }
        let from = mem::replace(&mut *active, name.to_string());
        drop(active);
        info!(from = %from, to = %name, "binding_set_activated");
        Ok(true)
    }

    /// Activate the set after the current one, wrapping around.
    pub fn next(&self) -> Result<bool> {
        self.step(Step::Forward)
    }

    /// Activate the set before the current one, wrapping around.
    pub fn previous(&self) -> Result<bool> {
        self.step(Step::Backward)
    }

    /// Move the active set one step in `dir`.
    fn step(&self, dir: Step) -> Result<bool> {
        let order = &self.control.order;
        let mut active = self.active.lock();
        let current = order.iter().position(|n| *n == *active);
        let idx = cycle(order.len(), current, dir)
            .ok_or_else(|| Error::Config("no binding sets configured".to_string()))?;
        let to = &order[idx];
        if *to == *active {
            return Ok(false);
        }
        let from = mem::replace(&mut *active, to.clone());
        drop(active);
        info!(from = %from, to = %to, "binding_set_activated");
        Ok(true)
    }

    /// Actions bound to `event` in the active set.
    pub fn resolve(&self, event: &Event) -> Option<ActionList> {
        let active = self.active.lock();
        self.sets.get(active.as_str())?.lookup(event)
    }
}

#[async_trait]
impl CommandTarget for BindingRegistry {
    fn check(&self, command: &str, params: &[Value]) -> Result<()> {
        self.control.check(command, params)
    }

    async fn execute(&self, command: &str, params: &[Value]) -> Result<()> {
        self.control.table.execute(self, command, params).await
    }
}
