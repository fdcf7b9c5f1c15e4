use crate::constants::NORMAL_TIME_SCALE;
use crate::scene::LoadRequest;
use crate::scheduler::SceneGate;

use super::{PhaseBehavior, PhaseContext};

/// Title screen: restores normal time and keeps the title scene loaded.
#[derive(Debug, Default)]
pub struct TitlePhase;

impl PhaseBehavior for TitlePhase {
    fn enter(&mut self, cx: &mut PhaseContext<'_>) {
        // A run may have ended while paused.
        cx.services.time_scale = NORMAL_TIME_SCALE;
        let title = cx.services.scene_names.title.clone();
        let request = cx.services.load_scene(&title);
        if let LoadRequest::Rejected { .. } = request {
            // Abandoned run still loading its arena: reload the title after it.
            cx.services.tasks.spawn(SceneGate::new(
                "title-reload-gate",
                cx.this.id(),
                move |services| {
                    services.load_scene(&title);
                },
            ));
        }
    }
}
