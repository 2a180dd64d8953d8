//! Request/response link to OBS and the events it pushes.

use async_trait::async_trait;
use keypad_engine::Result;
use serde_json::Value as Json;

/// A connection that can issue obs-websocket requests.
#[async_trait]
pub trait ObsLink: Send + Sync + 'static {
    /// Send `request_type` with extra `fields` and wait for an `ok` reply.
    ///
    /// A reply with `status: error` is an execution error; a transport
    /// failure or timeout is a connectivity error.
    async fn request(&self, request_type: &str, fields: Json) -> Result<Json>;

    /// Next pushed event, if one is waiting.
    fn poll_event(&self) -> Option<ObsEvent>;

    /// False once the transport has gone away.
    fn is_open(&self) -> bool;

    /// Close the transport.
    async fn close(&self);
}

/// Pushed OBS events that change cached state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsEvent {
    /// The program scene changed.
    SceneSwitched(String),
    /// The scene list of the current collection changed.
    ScenesChanged(Vec<String>),
    /// Another scene collection became current.
    CollectionChanged(String),
    /// Collections were added, removed or renamed.
    CollectionListChanged,
    /// Recording started.
    RecordingStarted,
    /// Recording stopped.
    RecordingStopped,
    /// Recording paused.
    RecordingPaused,
    /// Recording resumed.
    RecordingResumed,
    /// Streaming started.
    StreamingStarted,
    /// Streaming stopped.
    StreamingStopped,
}

impl ObsEvent {
    /// Decode an `update-type` message. Unrelated updates yield `None`.
    pub fn parse(msg: &Json) -> Option<Self> {
        let kind = msg.get("update-type")?.as_str()?;
        let ev = match kind {
            "SwitchScenes" => Self::SceneSwitched(str_field(msg, "scene-name")?),
            "ScenesChanged" => Self::ScenesChanged(names(msg.get("scenes")?, "name")),
            "SceneCollectionChanged" => {
                Self::CollectionChanged(str_field(msg, "sceneCollection")?)
            }
            "SceneCollectionListChanged" => Self::CollectionListChanged,
            "RecordingStarting" | "RecordingStarted" => Self::RecordingStarted,
            "RecordingStopping" | "RecordingStopped" => Self::RecordingStopped,
            "RecordingPaused" => Self::RecordingPaused,
            "RecordingResumed" => Self::RecordingResumed,
            "StreamStarting" | "StreamStarted" => Self::StreamingStarted,
            "StreamStopping" | "StreamStopped" => Self::StreamingStopped,
            _ => return None,
        };
        Some(ev)
    }
}

/// Owned string field of a JSON object.
pub(crate) fn str_field(msg: &Json, key: &str) -> Option<String> {
    msg.get(key)?.as_str().map(str::to_string)
}

/// Collect `key` from every object in a JSON array.
pub(crate) fn names(list: &Json, key: &str) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| str_field(item, key))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_scene_updates() {
        let ev = ObsEvent::parse(&json!({"update-type": "SwitchScenes", "scene-name": "Live"}));
        assert_eq!(ev, Some(ObsEvent::SceneSwitched("Live".into())));

        let ev = ObsEvent::parse(&json!({
            "update-type": "ScenesChanged",
            "scenes": [{"name": "A"}, {"name": "B"}, {"sources": []}]
        }));
        assert_eq!(ev, Some(ObsEvent::ScenesChanged(vec!["A".into(), "B".into()])));
    }

    #[test]
    fn parses_output_updates() {
        for (kind, want) in [
            ("RecordingStarting", ObsEvent::RecordingStarted),
            ("RecordingStopped", ObsEvent::RecordingStopped),
            ("RecordingPaused", ObsEvent::RecordingPaused),
            ("StreamStopping", ObsEvent::StreamingStopped),
        ] {
            assert_eq!(ObsEvent::parse(&json!({"update-type": kind})), Some(want));
        }
    }

    #[test]
    fn ignores_unrelated() {
        assert_eq!(ObsEvent::parse(&json!({"update-type": "Heartbeat"})), None);
        assert_eq!(ObsEvent::parse(&json!({"message-id": "1"})), None);
        assert_eq!(ObsEvent::parse(&json!({"update-type": "SwitchScenes"})), None);
    }
}
