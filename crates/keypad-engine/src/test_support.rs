//! Test support utilities for keypad-engine unit and integration tests.
//! These helpers are public so integration tests and downstream crates can
//! share them. They are intended for use by test suites only.

use std::{
    collections::HashSet,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::{CommandTarget, Error, Event, EventSource, LinkState, Result, Value};

/// A target that records every executed command.
///
/// Accepts any command unless built with [`RecordingTarget::with_commands`].
/// Like a real target, it refuses to execute once closed.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    /// Known command names, lowercased. `None` accepts anything.
    known: Option<HashSet<String>>,
    /// Commands that fail at execute time, lowercased.
    failing: Mutex<HashSet<String>>,
    /// Executed commands in order.
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    /// Simulated execution time.
    delay: Option<Duration>,
    /// Number of `close` calls.
    closes: AtomicUsize,
}

impl RecordingTarget {
    /// Target accepting any command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target accepting only `names`.
    pub fn with_commands(names: &[&str]) -> Self {
        Self {
            known: Some(names.iter().map(|n| n.to_ascii_lowercase()).collect()),
            ..Self::default()
        }
    }

    /// Sleep for `delay` inside every execute.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make `command` fail when executed.
    pub fn fail_on(&self, command: &str) {
        self.failing.lock().insert(command.to_ascii_lowercase());
    }

    /// Executed commands with their parameters.
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    /// Executed command names.
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Number of executed commands.
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of times `close` was called.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandTarget for RecordingTarget {
    fn check(&self, command: &str, _params: &[Value]) -> Result<()> {
        match &self.known {
            Some(known) if !known.contains(&command.to_ascii_lowercase()) => {
                Err(Error::UnknownCommand(command.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn execute(&self, command: &str, params: &[Value]) -> Result<()> {
        if self.closes() > 0 {
            return Err(Error::ChannelClosed);
        }
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        self.calls
            .lock()
            .push((command.to_string(), params.to_vec()));
        if self.failing.lock().contains(&command.to_ascii_lowercase()) {
            return Err(Error::Execution(format!("{command} failed")));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// An event source that replays a fixed list of keys.
#[derive(Debug)]
pub struct ScriptedSource {
    /// Source name.
    name: String,
    /// Keys to emit, in order.
    keys: Vec<String>,
    /// Pause before each key.
    gap: Duration,
    /// Keep the sink open after the script ends, until closed.
    hold_open: bool,
    /// Refuse to start.
    fail_start: bool,
    /// Replay task.
    task: Option<JoinHandle<()>>,
    /// Number of `close` calls, shared with the test.
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Source that emits `keys` once and then finishes.
    pub fn new(name: &str, keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            gap: Duration::ZERO,
            hold_open: false,
            fail_start: false,
            task: None,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait `gap` before each key.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    /// Keep delivering nothing after the script until closed.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Make `start` fail.
    pub fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Shared counter of `close` calls.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self, sink: mpsc::Sender<Event>) -> Result<()> {
        if self.fail_start {
            return Err(Error::Io(io::Error::other("device unavailable")));
        }
        let name = self.name.clone();
        let keys = self.keys.clone();
        let gap = self.gap;
        let hold_open = self.hold_open;
        self.task = Some(tokio::spawn(async move {
            for key in keys {
                if !gap.is_zero() {
                    sleep(gap).await;
                }
                if sink.send(Event::new(name.clone(), key)).await.is_err() {
                    return;
                }
            }
            if hold_open {
                sink.closed().await;
            }
        }));
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wait until `rx` reports `want`, up to `timeout_ms`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<LinkState>,
    want: LinkState,
    timeout_ms: u64,
) -> bool {
    matches!(
        timeout(Duration::from_millis(timeout_ms), rx.wait_for(|s| *s == want)).await,
        Ok(Ok(_))
    )
}
