//! Resolve events against the active binding set and run the bound actions.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{
    CommandTarget, Result,
    bindings::{BindingAction, BindingRegistry},
    source::Event,
    target::TargetRef,
};

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No binding for the key in the active set.
    Unbound,
    /// Every bound action succeeded.
    Completed {
        /// Number of actions run.
        actions: usize,
    },
    /// An action failed; later actions were not attempted.
    Failed {
        /// Zero-based position of the failing action.
        index: usize,
    },
}

/// Stateless front end over the binding registry. Cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Bindings and the active set.
    registry: Arc<BindingRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<BindingRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher resolves against.
    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    /// Handle one event. Failures are logged here and never returned.
    pub async fn dispatch(&self, event: &Event) -> Outcome {
        let Some(actions) = self.registry.resolve(event) else {
            debug!(source = %event.source, key = %event.key, "key_unbound");
            return Outcome::Unbound;
        };
        for (index, action) in actions.iter().enumerate() {
            if let Err(e) = self.run(action).await {
                warn!(
                    source = %event.source,
                    key = %event.key,
                    target_name = %action.target.name(),
                    command = %action.command,
                    index,
                    error = %e,
                    "binding_failed"
                );
                return Outcome::Failed { index };
            }
        }
        trace!(source = %event.source, key = %event.key, actions = actions.len(), "binding_done");
        Outcome::Completed {
            actions: actions.len(),
        }
    }

    /// Run a single action against its target.
    async fn run(&self, action: &BindingAction) -> Result<()> {
        match &action.target {
            TargetRef::Bindings => {
                self.registry
                    .execute(&action.command, &action.params)
                    .await
            }
            TargetRef::External { target, .. } => {
                target.execute(&action.command, &action.params).await
            }
        }
    }
}
