//! Build sources, targets and the controller from a loaded configuration.

use std::sync::Arc;

use config::{Config, KeypadDef, SourceKind, TargetDef, TargetKind};
use keypad_engine::{CommandTarget, Controller, EventSource, Result};
use serialpad::SerialKeypad;
use tracing::{info, warn};
use virtkey::KeyboardTarget;

/// Named targets in configuration order.
pub type Targets = Vec<(String, Arc<dyn CommandTarget>)>;

/// Open the event source described by `def`.
fn open_source(def: &KeypadDef) -> Result<Box<dyn EventSource>> {
    let name = def.effective_name();
    match &def.source {
        SourceKind::Serial(cfg) => Ok(Box::new(SerialKeypad::open(name, cfg)?)),
    }
}

/// Create the target described by `def`. Network targets connect in the background.
fn create_target(def: &TargetDef) -> Result<Arc<dyn CommandTarget>> {
    let name = def.effective_name();
    let target: Arc<dyn CommandTarget> = match &def.target {
        TargetKind::Obs(cfg) => {
            info!(target_name = %name, host = %cfg.host, port = cfg.port, "obs_target_created");
            Arc::new(obs_remote::spawn(name, cfg)?)
        }
        TargetKind::Keyboard(cfg) => {
            info!(target_name = %name, program = %cfg.program, "keyboard_target_created");
            Arc::new(KeyboardTarget::from_config(cfg)?)
        }
    };
    Ok(target)
}

/// Close every target in `targets`.
pub async fn close_targets(targets: &Targets) {
    for (name, target) in targets {
        warn!(target_name = %name, "closing_target_after_failed_startup");
        target.close().await;
    }
}

/// Build a controller for `cfg`.
///
/// Fails closed: when any source, target or binding cannot be set up, every
/// target created so far is closed before the error is returned.
pub async fn build(cfg: &Config) -> Result<Controller> {
    let mut sources = Vec::with_capacity(cfg.keypads.len());
    for def in &cfg.keypads {
        sources.push(open_source(def)?);
    }

    let mut targets: Targets = Vec::with_capacity(cfg.targets.len());
    for def in &cfg.targets {
        match create_target(def) {
            Ok(t) => targets.push((def.effective_name().to_string(), t)),
            Err(e) => {
                close_targets(&targets).await;
                return Err(e);
            }
        }
    }

    assemble(cfg, sources, targets).await
}

/// Hand opened sources and created targets to the controller builder.
pub async fn assemble(
    cfg: &Config,
    sources: Vec<Box<dyn EventSource>>,
    targets: Targets,
) -> Result<Controller> {
    let mut builder = Controller::builder()
        .max_inflight(cfg.dispatch.max_inflight)
        .binding_sets(cfg.bindings.iter().cloned());
    for source in sources {
        builder = builder.source(source);
    }
    for (name, target) in &targets {
        builder = builder.target(name.as_str(), target.clone());
    }
    match builder.build() {
        Ok(controller) => Ok(controller),
        Err(e) => {
            close_targets(&targets).await;
            Err(e)
        }
    }
}
