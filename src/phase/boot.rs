use bevy::log::info;

use crate::scheduler::SceneGate;

use super::{PhaseBehavior, PhaseContext, PhaseHandle, Transition};

/// First phase after launch: loads progress, creates the runtime services and
/// hands over to the title once the title scene is up.
#[derive(Debug, Default)]
pub struct BootPhase;

impl PhaseBehavior for BootPhase {
    fn enter(&mut self, cx: &mut PhaseContext<'_>) {
        let services = &mut *cx.services;
        services.persistence.initialize();
        services.ensure_runtime_services();
        services.apply_loaded_settings();

        let title = services.scene_names.title.clone();
        services.load_scene(&title);
        services.tasks.spawn(SceneGate::new(
            "boot-title-gate",
            cx.this.id(),
            |services| {
                info!("Boot complete");
                services
                    .transitions
                    .request(Transition::to(PhaseHandle::title(), "boot complete"));
            },
        ));
    }
}
