use bevy::log::{debug, warn};

use crate::mode::PauseContext;
use crate::services::Services;
use crate::ui_stack::OverlayKey;

use super::{PhaseBehavior, PhaseContext, PhaseHandle, Transition};

/// Freezes virtual time and shows the mode's pause overlay.
///
/// Resuming always returns to the exact gameplay instance that paused, so the
/// run is continued rather than restarted.
pub struct PausedPhase {
    context: Option<PauseContext>,
    resume_target: PhaseHandle,
    overlay: Option<OverlayKey>,
    saved_time_scale: Option<f32>,
    pushed: bool,
}

impl PausedPhase {
    pub fn new(
        context: PauseContext,
        resume_target: PhaseHandle,
        overlay: Option<OverlayKey>,
    ) -> Self {
        Self {
            context: Some(context),
            resume_target,
            overlay,
            saved_time_scale: None,
            pushed: false,
        }
    }

    /// Time scale captured on enter; `None` outside of an active pause.
    pub fn saved_time_scale(&self) -> Option<f32> {
        self.saved_time_scale
    }

    pub fn resume_target(&self) -> &PhaseHandle {
        &self.resume_target
    }

    pub fn context(&self) -> Option<&PauseContext> {
        self.context.as_ref()
    }

    /// Ask to return to the paused gameplay phase.
    pub fn resume(&self, services: &Services) -> bool {
        services
            .transitions
            .request(Transition::to(self.resume_target.clone(), "resume"))
    }
}

impl PhaseBehavior for PausedPhase {
    fn enter(&mut self, cx: &mut PhaseContext<'_>) {
        let services = &mut *cx.services;
        self.saved_time_scale = Some(services.time_scale);
        services.time_scale = 0.0;

        let Some(key) = self.overlay else {
            warn!("No pause overlay configured; pausing without a menu");
            return;
        };
        let Some(mut overlay) = services.overlays.instantiate(key) else {
            warn!("Pause overlay '{}' is not registered", key.0);
            return;
        };
        if let Some(context) = &self.context {
            if let Err(err) = overlay.initialize(context) {
                warn!("Pause overlay '{}' not initialized: {err}", key.0);
            }
        }
        services.ui.push(overlay);
        self.pushed = true;
    }

    fn exit(&mut self, cx: &mut PhaseContext<'_>) {
        let services = &mut *cx.services;
        if let Some(scale) = self.saved_time_scale.take() {
            services.time_scale = scale;
        }
        if self.pushed {
            services.ui.pop();
            self.pushed = false;
        } else {
            debug!("Pause exit without an overlay; UI stack untouched");
        }
        self.context = None;
    }
}
