use bevy::log::{debug, info};

use crate::error::{FlowError, FlowResult};
use crate::events::Signal;
use crate::services::Services;

use super::PhaseHandle;

/// Owns the active phase and performs exit-then-enter transitions.
#[derive(Default)]
pub struct PhaseMachine {
    current: Option<PhaseHandle>,
}

impl PhaseMachine {
    pub fn current(&self) -> Option<&PhaseHandle> {
        self.current.as_ref()
    }

    /// Make `next` the active phase.
    ///
    /// Requesting the instance that is already active does nothing: no exit,
    /// no enter, no `PhaseChanged`.  The previous phase is fully exited before
    /// the next one is entered.
    pub fn change_state(
        &mut self,
        next: Option<PhaseHandle>,
        services: &mut Services,
    ) -> FlowResult<()> {
        let next = next.ok_or(FlowError::MissingTarget)?;
        if self.current.as_ref() == Some(&next) {
            debug!("Phase {} already active; ignoring change", next.kind());
            return Ok(());
        }

        let previous = self.current.take();
        services.set_active_phase(None);
        if let Some(previous) = &previous {
            previous.exit(services);
        }

        self.current = Some(next.clone());
        services.set_active_phase(Some(next.id()));
        next.enter(services);

        info!(
            "Phase changed: {} -> {}",
            previous.as_ref().map_or("none", |phase| phase.kind().label()),
            next.kind()
        );
        services.bus.publish(&Signal::PhaseChanged {
            phase: next.kind(),
            id: next.id(),
        });
        Ok(())
    }

    pub fn tick(&mut self, services: &mut Services) {
        if let Some(current) = self.current.clone() {
            current.tick(services);
        }
    }
}
