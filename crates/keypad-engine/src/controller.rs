//! Startup validation and the event loop.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};

use config::BindingSetDef;
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    CommandTarget, Error, Result,
    bindings::{ActionList, BindingAction, BindingRegistry, BindingSet, ControlCommands},
    dispatch::Dispatcher,
    source::{Event, EventSource},
    target::{BINDINGS_TARGET, TargetRef},
};

/// Default bound on concurrently dispatched events.
pub const DEFAULT_MAX_INFLIGHT: usize = 64;

/// Capacity of the shared event channel.
const EVENT_QUEUE: usize = 256;

/// How long shutdown waits for in-flight events before abandoning them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns sources, targets and bindings, and runs the dispatch loop.
pub struct Controller {
    /// Event sources, started by [`Controller::run`].
    sources: Vec<Box<dyn EventSource>>,
    /// External targets, closed on shutdown.
    targets: Vec<(String, Arc<dyn CommandTarget>)>,
    /// Shared resolver.
    dispatcher: Dispatcher,
    /// Maximum in-flight events.
    max_inflight: usize,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("targets", &self.targets.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("active", &self.dispatcher.registry().active())
            .field("max_inflight", &self.max_inflight)
            .finish()
    }
}

impl Controller {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    /// A dispatcher sharing this controller's registry.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// The binding registry.
    pub fn registry(&self) -> Arc<BindingRegistry> {
        self.dispatcher.registry().clone()
    }

    /// Start every source and dispatch events until `shutdown` fires or all
    /// sources are exhausted. Sources and targets are closed before returning.
    ///
    /// Fails only if a source cannot be started; nothing that happens while
    /// handling an event ends the loop.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Event>(EVENT_QUEUE);
        let mut failure = None;
        for source in &mut self.sources {
            if let Err(e) = source.start(tx.clone()).await {
                error!(source = %source.name(), error = %e, "source_start_failed");
                failure = Some(e);
                break;
            }
        }
        if let Some(e) = failure {
            self.close().await;
            return Err(e);
        }
        drop(tx);
        info!(
            sources = self.sources.len(),
            targets = self.targets.len(),
            active = %self.dispatcher.registry().active(),
            "controller_started"
        );

        let permits = Arc::new(Semaphore::new(self.max_inflight));
        let mut tasks = JoinSet::new();
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                ev = rx.recv() => match ev {
                    Some(ev) => ev,
                    None => {
                        info!("all_sources_closed");
                        break;
                    }
                },
            };
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                p = permits.clone().acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };
            let dispatcher = self.dispatcher.clone();
            tasks.spawn(async move {
                let _permit = permit;
                dispatcher.dispatch(&event).await;
            });
            while tasks.try_join_next().is_some() {}
        }

        // Targets stay open until in-flight action lists have finished.
        self.close_sources().await;
        let drained = timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "dispatch_task_failed");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(pending = tasks.len(), "dispatch_drain_timed_out");
            tasks.shutdown().await;
        }
        self.close_targets().await;
        info!("controller_stopped");
        Ok(())
    }

    /// Close every source and target.
    async fn close(&mut self) {
        self.close_sources().await;
        self.close_targets().await;
    }

    /// Close every source.
    async fn close_sources(&mut self) {
        for source in &mut self.sources {
            source.close().await;
        }
    }

    /// Close every target.
    async fn close_targets(&mut self) {
        for (name, target) in &self.targets {
            debug!(target_name = %name, "target_close");
            target.close().await;
        }
    }
}

/// Collects sources, targets and binding set definitions, and validates them.
pub struct ControllerBuilder {
    /// Event sources.
    sources: Vec<Box<dyn EventSource>>,
    /// Named external targets.
    targets: Vec<(String, Arc<dyn CommandTarget>)>,
    /// Binding sets in configuration order.
    sets: Vec<BindingSetDef>,
    /// Bound on concurrent events.
    max_inflight: usize,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            targets: Vec::new(),
            sets: Vec::new(),
            max_inflight: DEFAULT_MAX_INFLIGHT,
        }
    }

    /// Add an event source.
    pub fn source(mut self, source: Box<dyn EventSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a named target.
    pub fn target(mut self, name: impl Into<String>, target: Arc<dyn CommandTarget>) -> Self {
        self.targets.push((name.into(), target));
        self
    }

    /// Add binding set definitions. The first set added starts active.
    pub fn binding_sets(mut self, sets: impl IntoIterator<Item = BindingSetDef>) -> Self {
        self.sets.extend(sets);
        self
    }

    /// Bound the number of events handled concurrently.
    pub fn max_inflight(mut self, n: usize) -> Self {
        self.max_inflight = n;
        self
    }

    /// Resolve and check every binding, then assemble the controller.
    ///
    /// Any failure aborts the build. The targets handed to the builder are not
    /// closed here.
    pub fn build(self) -> Result<Controller> {
        if self.sources.is_empty() {
            return Err(Error::Config("no event sources configured".to_string()));
        }
        if self.targets.is_empty() {
            return Err(Error::Config("no command targets configured".to_string()));
        }
        if self.sets.is_empty() {
            return Err(Error::Config("no binding sets configured".to_string()));
        }
        if self.max_inflight == 0 {
            return Err(Error::Config("max_inflight must be positive".to_string()));
        }

        let mut targets: HashMap<String, TargetRef> = HashMap::new();
        targets.insert(BINDINGS_TARGET.to_string(), TargetRef::Bindings);
        for (name, target) in &self.targets {
            if name == BINDINGS_TARGET {
                return Err(Error::Config(format!(
                    "target name '{BINDINGS_TARGET}' is reserved"
                )));
            }
            let entry = TargetRef::External {
                name: name.clone(),
                target: target.clone(),
            };
            if targets.insert(name.clone(), entry).is_some() {
                return Err(Error::Config(format!("duplicate target name '{name}'")));
            }
        }

        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(self.sets.len());
        for def in &self.sets {
            let name = def.effective_name();
            if !seen.insert(name) {
                return Err(Error::Config(format!("duplicate binding set name '{name}'")));
            }
            order.push(name.to_string());
        }

        let control = ControlCommands::new(order)?;
        let sets = self
            .sets
            .iter()
            .map(|def| resolve_set(def, &targets, &control))
            .collect::<Result<Vec<_>>>()?;
        let registry = Arc::new(BindingRegistry::new(sets, control)?);
        info!(
            sets = registry.order().len(),
            targets = self.targets.len(),
            active = %registry.active(),
            "bindings_resolved"
        );

        Ok(Controller {
            sources: self.sources,
            targets: self.targets,
            dispatcher: Dispatcher::new(registry),
            max_inflight: self.max_inflight,
        })
    }
}

/// Resolve every binding in one set definition.
fn resolve_set(
    def: &BindingSetDef,
    targets: &HashMap<String, TargetRef>,
    control: &ControlCommands,
) -> Result<BindingSet> {
    let set = def.effective_name();
    let mut keys: HashMap<String, ActionList> = HashMap::new();
    for binding in &def.bindings {
        if binding.keys.is_empty() {
            return Err(Error::Config(format!(
                "binding set '{set}': a binding has no keys"
            )));
        }
        if binding.commands.is_empty() {
            return Err(Error::Config(format!(
                "binding set '{set}': binding for {:?} has no commands",
                binding.keys
            )));
        }
        let actions = binding
            .commands
            .iter()
            .map(|inv| {
                resolve_action(inv, targets, control).map_err(|e| Error::Binding {
                    set: set.to_string(),
                    command: inv.command.clone(),
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let list: ActionList = actions.into();
        for key in &binding.keys {
            if keys.insert(key.clone(), list.clone()).is_some() {
                warn!(set = %set, key = %key, "duplicate_key_binding");
            }
        }
    }
    Ok(BindingSet {
        name: set.to_string(),
        keys,
    })
}

/// Split, look up and check one `target.command` invocation.
fn resolve_action(
    inv: &config::Invocation,
    targets: &HashMap<String, TargetRef>,
    control: &ControlCommands,
) -> Result<BindingAction> {
    let (target_name, command) = inv.split().ok_or_else(|| {
        Error::Config(format!(
            "'{}' is not of the form target.command",
            inv.command
        ))
    })?;
    let target = targets
        .get(target_name)
        .ok_or_else(|| Error::UnknownTarget(target_name.to_string()))?;
    match target {
        TargetRef::Bindings => control.check(command, &inv.params)?,
        TargetRef::External { target, .. } => target.check(command, &inv.params)?,
    }
    Ok(BindingAction {
        target: target.clone(),
        command: command.to_string(),
        params: inv.params.clone(),
    })
}
