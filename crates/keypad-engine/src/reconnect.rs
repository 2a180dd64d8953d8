//! Command targets backed by a session that may drop and come back.
//!
//! [`ReconnectingTarget`] owns one background driver task per target. The
//! driver is the only code that touches the live session: it connects, runs
//! the target's refresh, serves queued commands one at a time, and probes the
//! session after a period of inactivity. Callers talk to it through a bounded
//! FIFO queue and receive exactly one reply per command.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{CommandTarget, Error, Result, Value, command::CommandTable};

/// Delay between connection attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Inactivity period after which the session is probed.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Depth of the per-target command queue.
const QUEUE_DEPTH: usize = 32;

/// Connection state of a reconnecting target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No session; waiting to retry.
    Disconnected,
    /// A connection attempt or refresh is in progress.
    Connecting,
    /// Session established and refreshed; commands are served.
    Ready,
}

/// Timing and queueing behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay between connection attempts.
    pub retry_interval: Duration,
    /// Inactivity period before a probe.
    pub probe_interval: Duration,
    /// Fail `execute` with [`Error::NotConnected`] while not ready instead of queueing.
    pub fail_when_disconnected: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_interval: RETRY_INTERVAL,
            probe_interval: PROBE_INTERVAL,
            fail_when_disconnected: false,
        }
    }
}

/// Opens sessions.
#[async_trait]
pub trait Connector: Send + 'static {
    /// Session type produced by this connector.
    type Session: Session;

    /// Attempt one connection.
    async fn connect(&mut self) -> Result<Self::Session>;
}

/// A live connection plus whatever state the target caches about it.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Reload cached state. Runs once after every successful connect.
    async fn refresh(&self) -> Result<()>;

    /// Cheap liveness check.
    async fn probe(&self) -> Result<()>;

    /// False once the underlying connection is known to be gone.
    fn is_alive(&self) -> bool {
        true
    }

    /// Tear down the connection.
    async fn close(&self) {}
}

/// One queued command and the slot for its result.
struct Request {
    /// Command name.
    command: String,
    /// Command parameters.
    params: Vec<Value>,
    /// Receives exactly one result.
    reply: oneshot::Sender<Result<()>>,
}

/// A command target that serialises commands onto a reconnecting session.
pub struct ReconnectingTarget<S: Session> {
    /// Target name, for logs and errors.
    name: String,
    /// Shared with the driver; used here for bind-time checks.
    table: Arc<CommandTable<S>>,
    /// Command queue into the driver.
    tx: mpsc::Sender<Request>,
    /// Link state published by the driver.
    state: watch::Receiver<LinkState>,
    /// Fail fast while disconnected.
    fail_when_disconnected: bool,
    /// Stops the driver.
    cancel: CancellationToken,
    /// Driver task, taken on close.
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Session> fmt::Debug for ReconnectingTarget<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingTarget")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: Session> ReconnectingTarget<S> {
    /// Start the driver task and return immediately. Must run inside a tokio runtime.
    pub fn spawn<C>(
        name: impl Into<String>,
        connector: C,
        table: CommandTable<S>,
        policy: ReconnectPolicy,
    ) -> Self
    where
        C: Connector<Session = S>,
    {
        let name = name.into();
        let table = Arc::new(table);
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
        let cancel = CancellationToken::new();
        let driver = Driver {
            name: name.clone(),
            connector,
            table: table.clone(),
            rx,
            state: state_tx,
            policy: policy.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(driver.run());
        Self {
            name,
            table,
            tx,
            state: state_rx,
            fail_when_disconnected: policy.fail_when_disconnected,
            cancel,
            driver: Mutex::new(Some(handle)),
        }
    }

    /// Target name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Watch link state changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }
}

#[async_trait]
impl<S: Session> CommandTarget for ReconnectingTarget<S> {
    fn check(&self, command: &str, params: &[Value]) -> Result<()> {
        self.table.check(command, params)
    }

    async fn execute(&self, command: &str, params: &[Value]) -> Result<()> {
        if self.fail_when_disconnected && self.state() != LinkState::Ready {
            return Err(Error::NotConnected(self.name.clone()));
        }
        let (reply, rx) = oneshot::channel();
        let req = Request {
            command: command.to_string(),
            params: params.to_vec(),
            reply,
        };
        self.tx.send(req).await.map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    async fn close(&self) {
        self.cancel.cancel();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(target_name = %self.name, error = %e, "driver_join_failed");
        }
    }
}

impl<S: Session> Drop for ReconnectingTarget<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why [`Driver::serve`] returned.
enum ServeExit {
    /// The session is gone; reconnect.
    Lost,
    /// Shut down or every handle was dropped.
    Stop,
}

/// Background task owning the session.
struct Driver<C: Connector> {
    /// Target name, for logs.
    name: String,
    /// Opens sessions.
    connector: C,
    /// Command bodies.
    table: Arc<CommandTable<C::Session>>,
    /// Command queue.
    rx: mpsc::Receiver<Request>,
    /// Published link state.
    state: watch::Sender<LinkState>,
    /// Timing.
    policy: ReconnectPolicy,
    /// Shutdown signal.
    cancel: CancellationToken,
}

impl<C: Connector> Driver<C> {
    /// Connect, serve, and reconnect until cancelled.
    async fn run(mut self) {
        while let Some(session) = self.establish().await {
            let exit = self.serve(&session).await;
            session.close().await;
            self.set_state(LinkState::Disconnected);
            if matches!(exit, ServeExit::Stop) {
                break;
            }
            info!(target_name = %self.name, "target_disconnected");
        }
        self.set_state(LinkState::Disconnected);
        debug!(target_name = %self.name, "driver_stopped");
    }

    /// Publish a state if it differs from the current one.
    fn set_state(&self, next: LinkState) {
        self.state.send_if_modified(|cur| {
            if *cur == next {
                false
            } else {
                *cur = next;
                true
            }
        });
    }

    /// Retry until a session is connected and refreshed. `None` on shutdown.
    async fn establish(&mut self) -> Option<C::Session> {
        let mut attempts: u64 = 0;
        loop {
            self.set_state(LinkState::Connecting);
            attempts += 1;
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                r = self.connector.connect() => r,
            };
            match attempt {
                Ok(session) => match session.refresh().await {
                    Ok(()) => {
                        self.set_state(LinkState::Ready);
                        info!(target_name = %self.name, attempts, "target_ready");
                        return Some(session);
                    }
                    Err(e) => {
                        warn!(target_name = %self.name, error = %e, "refresh_failed");
                        session.close().await;
                    }
                },
                Err(e) if attempts == 1 => {
                    warn!(target_name = %self.name, error = %e, "connect_failed");
                }
                Err(e) => {
                    debug!(target_name = %self.name, attempts, error = %e, "connect_failed");
                }
            }
            self.set_state(LinkState::Disconnected);
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = sleep(self.policy.retry_interval) => {}
            }
        }
    }

    /// Serve queued commands and probe when idle.
    async fn serve(&mut self, session: &C::Session) -> ServeExit {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return ServeExit::Stop,
                req = self.rx.recv() => {
                    let Some(req) = req else {
                        return ServeExit::Stop;
                    };
                    let result = self.table.execute(session, &req.command, &req.params).await;
                    if let Err(e) = &result {
                        debug!(target_name = %self.name, command = %req.command, error = %e, "command_failed");
                    }
                    if req.reply.send(result).is_err() {
                        debug!(target_name = %self.name, command = %req.command, "caller_gone");
                    }
                    if !session.is_alive() {
                        warn!(target_name = %self.name, "session_lost");
                        return ServeExit::Lost;
                    }
                }
                _ = sleep(self.policy.probe_interval) => {
                    if let Err(e) = session.probe().await {
                        warn!(target_name = %self.name, error = %e, "probe_failed");
                        return ServeExit::Lost;
                    }
                }
            }
        }
    }
}
