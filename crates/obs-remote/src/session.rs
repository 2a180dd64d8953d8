//! Cached OBS state and the domain operations behind each command.

use async_trait::async_trait;
use keypad_engine::{Error, Result, Session, Step, cycle};
use parking_lot::Mutex;
use serde_json::{Value as Json, json};
use tracing::{debug, info};

use crate::link::{ObsEvent, ObsLink, names, str_field};

/// What we know about the connected OBS instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObsState {
    /// Scene collection names.
    pub collections: Vec<String>,
    /// Current scene collection.
    pub active_collection: String,
    /// Scene names of the current collection.
    pub scenes: Vec<String>,
    /// Current program scene.
    pub active_scene: String,
    /// Streaming output active.
    pub streaming: bool,
    /// Recording output active.
    pub recording: bool,
    /// Recording paused.
    pub recording_paused: bool,
}

/// Which output a start/stop operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    /// The recording output.
    Recording,
    /// The streaming output.
    Streaming,
}

/// One live OBS connection plus its cached state.
pub struct ObsSession<L> {
    /// Transport.
    link: L,
    /// Cached state. Never held across an await.
    state: Mutex<ObsState>,
}

impl<L: ObsLink> ObsSession<L> {
    /// Wrap a connected link. State stays empty until [`Session::refresh`].
    pub fn new(link: L) -> Self {
        Self {
            link,
            state: Mutex::new(ObsState::default()),
        }
    }

    /// Copy of the cached state.
    pub fn snapshot(&self) -> ObsState {
        self.state.lock().clone()
    }

    /// The underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Apply pushed events to the cache, reloading lists where an event
    /// only says that something changed.
    pub async fn sync_events(&self) -> Result<()> {
        let mut reload_collections = false;
        let mut reload_scenes = false;
        while let Some(ev) = self.link.poll_event() {
            debug!(event = ?ev, "obs_event");
            let mut st = self.state.lock();
            match ev {
                ObsEvent::SceneSwitched(name) => st.active_scene = name,
                ObsEvent::ScenesChanged(scenes) => st.scenes = scenes,
                ObsEvent::CollectionChanged(name) => {
                    st.active_collection = name;
                    reload_scenes = true;
                }
                ObsEvent::CollectionListChanged => reload_collections = true,
                ObsEvent::RecordingStarted => {
                    st.recording = true;
                    st.recording_paused = false;
                }
                ObsEvent::RecordingStopped => {
                    st.recording = false;
                    st.recording_paused = false;
                }
                ObsEvent::RecordingPaused => st.recording_paused = true,
                ObsEvent::RecordingResumed => st.recording_paused = false,
                ObsEvent::StreamingStarted => st.streaming = true,
                ObsEvent::StreamingStopped => st.streaming = false,
            }
        }
        if reload_collections {
            self.refresh_collections().await
        } else if reload_scenes {
            self.refresh_scenes().await
        } else {
            Ok(())
        }
    }

    /// Reload the scene list of the current collection.
    async fn refresh_scenes(&self) -> Result<()> {
        let reply = self.link.request("GetSceneList", json!({})).await?;
        let scenes = names(reply.get("scenes").unwrap_or(&Json::Null), "name");
        let current = str_field(&reply, "current-scene").unwrap_or_default();
        let mut st = self.state.lock();
        st.scenes = scenes;
        st.active_scene = current;
        Ok(())
    }

    /// Reload collections, the current collection, and its scenes.
    async fn refresh_collections(&self) -> Result<()> {
        let reply = self.link.request("ListSceneCollections", json!({})).await?;
        let collections = names(
            reply.get("scene-collections").unwrap_or(&Json::Null),
            "sc-name",
        );
        let reply = self
            .link
            .request("GetCurrentSceneCollection", json!({}))
            .await?;
        let current = str_field(&reply, "sc-name").unwrap_or_default();
        {
            let mut st = self.state.lock();
            st.collections = collections;
            st.active_collection = current;
        }
        self.refresh_scenes().await
    }

    /// Reload the streaming and recording flags.
    async fn refresh_outputs(&self) -> Result<()> {
        let reply = self.link.request("GetStreamingStatus", json!({})).await?;
        let flag = |key: &str| reply.get(key).and_then(Json::as_bool).unwrap_or(false);
        let mut st = self.state.lock();
        st.streaming = flag("streaming");
        st.recording = flag("recording");
        st.recording_paused = flag("recording-paused");
        Ok(())
    }

    /// Switch the program scene. `Collection.Scene` switches collection first
    /// when the name is not a scene of the current collection.
    pub async fn activate_scene(&self, name: &str) -> Result<()> {
        let known = self.state.lock().scenes.iter().any(|s| s == name);
        if known {
            return self.set_scene(name).await;
        }
        match name.split_once('.') {
            Some((collection, scene)) => {
                self.activate_collection(collection).await?;
                self.set_scene(scene).await
            }
            None => Err(Error::Execution(format!("unknown scene '{name}'"))),
        }
    }

    /// Step to the previous or next scene, wrapping around.
    ///
    /// The scene list is only known once connected, long after bindings are
    /// checked, so an empty list is an execution error.
    pub async fn cycle_scene(&self, step: Step) -> Result<()> {
        let target = {
            let st = self.state.lock();
            let current = st.scenes.iter().position(|s| *s == st.active_scene);
            cycle(st.scenes.len(), current, step).map(|i| st.scenes[i].clone())
        };
        match target {
            Some(scene) => self.set_scene(&scene).await,
            None => Err(Error::Execution("OBS reports no scenes".to_string())),
        }
    }

    /// Switch scene collection. Unknown names fail without a request.
    pub async fn activate_collection(&self, name: &str) -> Result<()> {
        if !self.state.lock().collections.iter().any(|c| c == name) {
            return Err(Error::Execution(format!("unknown scene collection '{name}'")));
        }
        self.link
            .request("SetCurrentSceneCollection", json!({ "sc-name": name }))
            .await?;
        self.state.lock().active_collection = name.to_string();
        info!(collection = %name, "obs_collection_activated");
        self.refresh_scenes().await
    }

    /// Step to the previous or next collection, wrapping around. An empty
    /// list is an execution error, as for scenes.
    pub async fn cycle_collection(&self, step: Step) -> Result<()> {
        let target = {
            let st = self.state.lock();
            let current = st
                .collections
                .iter()
                .position(|c| *c == st.active_collection);
            cycle(st.collections.len(), current, step).map(|i| st.collections[i].clone())
        };
        match target {
            Some(collection) => self.activate_collection(&collection).await,
            None => Err(Error::Execution(
                "OBS reports no scene collections".to_string(),
            )),
        }
    }

    /// Send `SetCurrentScene` and record the result.
    async fn set_scene(&self, name: &str) -> Result<()> {
        self.link
            .request("SetCurrentScene", json!({ "scene-name": name }))
            .await?;
        self.state.lock().active_scene = name.to_string();
        debug!(scene = %name, "obs_scene_activated");
        Ok(())
    }

    /// Whether `output` is currently running.
    fn running(&self, output: Output) -> bool {
        let st = self.state.lock();
        match output {
            Output::Recording => st.recording,
            Output::Streaming => st.streaming,
        }
    }

    /// Start or stop `output`, skipping the request when already in that state.
    async fn set_output(&self, output: Output, on: bool) -> Result<()> {
        if self.running(output) == on {
            return Ok(());
        }
        let request = match (output, on) {
            (Output::Recording, true) => "StartRecording",
            (Output::Recording, false) => "StopRecording",
            (Output::Streaming, true) => "StartStreaming",
            (Output::Streaming, false) => "StopStreaming",
        };
        self.link.request(request, json!({})).await?;
        let mut st = self.state.lock();
        match output {
            Output::Recording => {
                st.recording = on;
                st.recording_paused = false;
            }
            Output::Streaming => st.streaming = on,
        }
        Ok(())
    }

    /// Start recording unless already recording.
    pub async fn start_recording(&self) -> Result<()> {
        self.set_output(Output::Recording, true).await
    }

    /// Stop recording unless already stopped.
    pub async fn stop_recording(&self) -> Result<()> {
        self.set_output(Output::Recording, false).await
    }

    /// Start or stop recording.
    pub async fn toggle_recording(&self) -> Result<()> {
        let on = !self.running(Output::Recording);
        self.set_output(Output::Recording, on).await
    }

    /// Pause an active, unpaused recording.
    pub async fn pause_recording(&self) -> Result<()> {
        self.set_paused(true).await
    }

    /// Resume a paused recording.
    pub async fn resume_recording(&self) -> Result<()> {
        self.set_paused(false).await
    }

    /// Pause or resume the recording.
    pub async fn toggle_pause_recording(&self) -> Result<()> {
        let paused = self.state.lock().recording_paused;
        self.set_paused(!paused).await
    }

    /// Pause or resume; a no-op when not recording or already in that state.
    async fn set_paused(&self, paused: bool) -> Result<()> {
        {
            let st = self.state.lock();
            if !st.recording || st.recording_paused == paused {
                return Ok(());
            }
        }
        let request = if paused {
            "PauseRecording"
        } else {
            "ResumeRecording"
        };
        self.link.request(request, json!({})).await?;
        self.state.lock().recording_paused = paused;
        Ok(())
    }

    /// Start streaming unless already streaming.
    pub async fn start_streaming(&self) -> Result<()> {
        self.set_output(Output::Streaming, true).await
    }

    /// Stop streaming unless already stopped.
    pub async fn stop_streaming(&self) -> Result<()> {
        self.set_output(Output::Streaming, false).await
    }

    /// Start or stop streaming.
    pub async fn toggle_streaming(&self) -> Result<()> {
        let on = !self.running(Output::Streaming);
        self.set_output(Output::Streaming, on).await
    }
}

#[async_trait]
impl<L: ObsLink> Session for ObsSession<L> {
    async fn refresh(&self) -> Result<()> {
        while self.link.poll_event().is_some() {}
        self.refresh_collections().await?;
        self.refresh_outputs().await?;
        let st = self.snapshot();
        info!(
            collection = %st.active_collection,
            scene = %st.active_scene,
            scenes = st.scenes.len(),
            streaming = st.streaming,
            recording = st.recording,
            "obs_state_loaded"
        );
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        self.sync_events().await?;
        self.link.request("GetVersion", json!({})).await.map(|_| ())
    }

    fn is_alive(&self) -> bool {
        self.link.is_open()
    }

    async fn close(&self) {
        self.link.close().await;
    }
}
