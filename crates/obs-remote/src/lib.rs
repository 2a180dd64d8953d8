//! OBS Studio as a keypad command target.
//!
//! The target keeps one obs-websocket connection alive in the background and
//! serialises commands onto it. Scene, collection and output state is cached
//! on connect and kept current from pushed events, so toggles and cycling
//! commands need at most one request.

use std::time::Duration;

use config::ObsConfig;
use keypad_engine::{ReconnectPolicy, ReconnectingTarget, Result};

mod auth;
mod commands;
mod link;
mod session;
mod ws;

pub use commands::table;
pub use link::{ObsEvent, ObsLink};
pub use session::{ObsSession, ObsState};
pub use ws::{WsConnector, WsLink};

/// The production OBS target.
pub type ObsTarget = ReconnectingTarget<ObsSession<WsLink>>;

/// Reconnect timing and queueing for `cfg`.
pub fn policy(cfg: &ObsConfig) -> ReconnectPolicy {
    ReconnectPolicy {
        retry_interval: Duration::from_millis(cfg.retry_ms),
        probe_interval: Duration::from_millis(cfg.probe_ms),
        fail_when_disconnected: cfg.fail_when_disconnected,
    }
}

/// Start an OBS target named `name`. Returns at once; the connection is made
/// in the background. Must run inside a tokio runtime.
pub fn spawn(name: &str, cfg: &ObsConfig) -> Result<ObsTarget> {
    Ok(ReconnectingTarget::spawn(
        name,
        WsConnector::new(cfg),
        table()?,
        policy(cfg),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_config() {
        let cfg = ObsConfig {
            retry_ms: 250,
            fail_when_disconnected: true,
            ..ObsConfig::default()
        };
        let p = policy(&cfg);
        assert_eq!(p.retry_interval, Duration::from_millis(250));
        assert_eq!(p.probe_interval, Duration::from_secs(5));
        assert!(p.fail_when_disconnected);
    }

    #[test]
    fn table_lists_every_command() {
        let t = table::<WsLink>().unwrap();
        assert_eq!(t.names().len(), 15);
        assert!(t.contains("ActivateScene"));
        assert!(t.contains("togglepauserecording"));
    }
}
