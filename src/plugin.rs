//! Bevy integration — `FlowPlugin`.
//!
//! The [`Director`] holds `Rc`-shared state, so it lives in the world as a
//! non-send resource and every system touching it runs on the main thread.
//!
//! ## Systems
//!
//! | System              | Schedule  | Purpose                                        |
//! |---------------------|-----------|------------------------------------------------|
//! | `boot_director`     | `Startup` | Enter the boot phase                           |
//! | `flow_input_system` | `Update`  | Escape toggles pause, Enter starts a run       |
//! | `drive_director`    | `Update`  | Advance the wall clock, tick tasks and phases  |
//! | `sync_virtual_time` | `Update`  | Mirror the core's time scale onto `Time<Virtual>` |

use bevy::prelude::*;

use crate::config::FlowConfig;
use crate::director::Director;
use crate::services::Services;

pub struct FlowPlugin {
    pub config: FlowConfig,
}

impl FlowPlugin {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }
}

impl Plugin for FlowPlugin {
    fn build(&self, app: &mut App) {
        let services = Services::from_config(&self.config);
        app.insert_non_send_resource(Director::new(services))
            .add_systems(Startup, boot_director)
            .add_systems(
                Update,
                (flow_input_system, drive_director, sync_virtual_time).chain(),
            );
    }
}

pub fn boot_director(mut director: NonSendMut<Director>) {
    if let Err(err) = director.boot() {
        error!("Boot failed: {err}");
    }
}

/// Input is optional so the plugin also runs headless without `InputPlugin`.
pub fn flow_input_system(
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mut director: NonSendMut<Director>,
) {
    let Some(keys) = keys else {
        return;
    };
    if keys.just_pressed(KeyCode::Escape) {
        director.toggle_pause();
    }
    if keys.just_pressed(KeyCode::Enter) {
        if let Err(err) = director.start_run() {
            error!("Could not start a run: {err}");
        }
    }
}

pub fn drive_director(time: Res<Time<Real>>, mut director: NonSendMut<Director>) {
    director.services().clock.set(time.elapsed());
    director.tick();
}

/// A zero time scale pauses virtual time; anything else runs it at that speed.
pub fn sync_virtual_time(director: NonSend<Director>, mut time: ResMut<Time<Virtual>>) {
    let scale = director.services().time_scale;
    if scale <= 0.0 {
        if !time.is_paused() {
            time.pause();
        }
        return;
    }
    if time.is_paused() {
        time.unpause();
    }
    if time.relative_speed() != scale {
        time.set_relative_speed(scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageKind;
    use crate::phase::PhaseKind;

    fn headless_app() -> App {
        let config = FlowConfig {
            storage: StorageKind::Memory,
            load_frames: 1,
            ..FlowConfig::default()
        };
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, FlowPlugin::new(config)));
        app
    }

    #[test]
    fn boots_into_title_headless() {
        let mut app = headless_app();
        for _ in 0..4 {
            app.update();
        }
        let director = app.world().non_send_resource::<Director>();
        assert_eq!(director.current_kind(), Some(PhaseKind::Title));
    }

    #[test]
    fn pausing_freezes_virtual_time() {
        let mut app = headless_app();
        for _ in 0..4 {
            app.update();
        }
        {
            let mut director = app.world_mut().non_send_resource_mut::<Director>();
            director.start_run().unwrap();
        }
        for _ in 0..3 {
            app.update();
        }
        app.world_mut()
            .non_send_resource_mut::<Director>()
            .toggle_pause();
        app.update();

        assert!(app.world().resource::<Time<Virtual>>().is_paused());

        app.world_mut()
            .non_send_resource_mut::<Director>()
            .toggle_pause();
        app.update();
        assert!(!app.world().resource::<Time<Virtual>>().is_paused());
    }
}
