//! The OBS command table.

use futures::future::BoxFuture;
use keypad_engine::{
    CommandDef, CommandTable, Error, Result, Step, Value,
    command::{expect_str, no_params, single_str},
};

use crate::{link::ObsLink, session::ObsSession};

/// Define a command body that applies pending OBS events before running.
macro_rules! obs_exec {
    ($name:ident, |$s:ident, $p:ident| $body:expr) => {
        #[doc = concat!("Body of the `", stringify!($name), "` command.")]
        fn $name<'a, L: ObsLink>(
            $s: &'a ObsSession<L>,
            $p: &'a [Value],
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                $s.sync_events().await?;
                $body.await
            })
        }
    };
}

/// The single string parameter of a name command.
fn name_param<'a>(command: &str, params: &'a [Value]) -> Result<&'a str> {
    expect_str(params, 0).map_err(|reason| Error::InvalidParameters {
        command: command.to_string(),
        reason,
    })
}

obs_exec!(activate_scene, |s, p| s.activate_scene(name_param("activatescene", p)?));
obs_exec!(prev_scene, |s, _p| s.cycle_scene(Step::Backward));
obs_exec!(next_scene, |s, _p| s.cycle_scene(Step::Forward));
obs_exec!(activate_collection, |s, p| s
    .activate_collection(name_param("activatescenecollection", p)?));
obs_exec!(prev_collection, |s, _p| s.cycle_collection(Step::Backward));
obs_exec!(next_collection, |s, _p| s.cycle_collection(Step::Forward));
obs_exec!(start_recording, |s, _p| s.start_recording());
obs_exec!(stop_recording, |s, _p| s.stop_recording());
obs_exec!(toggle_recording, |s, _p| s.toggle_recording());
obs_exec!(pause_recording, |s, _p| s.pause_recording());
obs_exec!(resume_recording, |s, _p| s.resume_recording());
obs_exec!(toggle_pause_recording, |s, _p| s.toggle_pause_recording());
obs_exec!(start_streaming, |s, _p| s.start_streaming());
obs_exec!(stop_streaming, |s, _p| s.stop_streaming());
obs_exec!(toggle_streaming, |s, _p| s.toggle_streaming());

/// Build the command table for a session over link type `L`.
pub fn table<L: ObsLink>() -> Result<CommandTable<ObsSession<L>>> {
    CommandTable::new([
        CommandDef::new("activatescene", single_str, activate_scene::<L>),
        CommandDef::new("prevscene", no_params, prev_scene::<L>),
        CommandDef::new("nextscene", no_params, next_scene::<L>),
        CommandDef::new(
            "activatescenecollection",
            single_str,
            activate_collection::<L>,
        ),
        CommandDef::new("prevscenecollection", no_params, prev_collection::<L>),
        CommandDef::new("nextscenecollection", no_params, next_collection::<L>),
        CommandDef::new("startrecording", no_params, start_recording::<L>),
        CommandDef::new("stoprecording", no_params, stop_recording::<L>),
        CommandDef::new("togglerecording", no_params, toggle_recording::<L>),
        CommandDef::new("pauserecording", no_params, pause_recording::<L>),
        CommandDef::new("resumerecording", no_params, resume_recording::<L>),
        CommandDef::new(
            "togglepauserecording",
            no_params,
            toggle_pause_recording::<L>,
        ),
        CommandDef::new("startstreaming", no_params, start_streaming::<L>),
        CommandDef::new("stopstreaming", no_params, stop_streaming::<L>),
        CommandDef::new("togglestreaming", no_params, toggle_streaming::<L>),
    ])
}
