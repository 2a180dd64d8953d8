//! Event sources and the events they produce.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// A single key press.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    /// Name of the source that produced the event.
    pub source: String,
    /// Key label as reported by the source.
    pub key: String,
}

impl Event {
    /// Create an event.
    pub fn new(source: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
        }
    }

    /// Source-qualified key identifier, `source.key`.
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.source, self.key)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.key)
    }
}

/// A producer of key-press events.
#[async_trait]
pub trait EventSource: Send {
    /// Source name used to qualify keys.
    fn name(&self) -> &str;

    /// Begin delivering events to `sink` in the background.
    ///
    /// Delivery stops when the source is exhausted or closed; the source drops
    /// its sender at that point.
    async fn start(&mut self, sink: mpsc::Sender<Event>) -> Result<()>;

    /// Stop delivering and release the device. Safe to call repeatedly, and
    /// safe to call when `start` never succeeded.
    async fn close(&mut self);
}
