//! Top-level orchestrator: owns the phase machine and the service context,
//! and is the only entry point external triggers use.
//!
//! Transitions requested from inside a dispatch (a listener, a task or a
//! phase hook) are parked in [`TransitionSlot`](crate::phase::TransitionSlot)
//! and applied as soon as that dispatch returns, so no transition ever starts
//! while another is still running.

use bevy::log::{debug, info, warn};

use crate::error::FlowResult;
use crate::events::Signal;
use crate::phase::{PhaseHandle, PhaseKind, PhaseMachine, RunResult};
use crate::scheduler::run_tasks;
use crate::services::Services;

/// Upper bound on transitions chained from one trigger.
const MAX_CHAINED_TRANSITIONS: usize = 8;

pub struct Director {
    machine: PhaseMachine,
    services: Services,
}

impl Director {
    pub fn new(services: Services) -> Self {
        Self {
            machine: PhaseMachine::default(),
            services,
        }
    }

    /// Enter the boot phase.
    pub fn boot(&mut self) -> FlowResult<()> {
        self.change_state(Some(PhaseHandle::boot()))
    }

    pub fn change_state(&mut self, next: Option<PhaseHandle>) -> FlowResult<()> {
        self.machine.change_state(next, &mut self.services)?;
        self.apply_pending();
        Ok(())
    }

    /// One host frame: poll tasks, then tick the active phase.
    pub fn tick(&mut self) {
        run_tasks(&mut self.services);
        self.apply_pending();
        self.machine.tick(&mut self.services);
        self.apply_pending();
    }

    /// Publish a signal on the bus and apply whatever it triggered.
    pub fn publish(&mut self, signal: Signal) {
        self.services.bus.publish(&signal);
        self.apply_pending();
    }

    /// The edge-triggered pause action.  Only acts in Gameplay or Paused.
    pub fn toggle_pause(&mut self) {
        let Some(current) = self.machine.current().cloned() else {
            return;
        };
        let services = &self.services;
        let requested = current.inspect(|phase| {
            if let Some(gameplay) = phase.as_gameplay() {
                gameplay.request_pause(services, &current)
            } else if let Some(paused) = phase.as_paused() {
                paused.resume(services)
            } else {
                debug!("Pause toggle ignored in {}", current.kind());
                false
            }
        });
        if requested {
            self.apply_pending();
        }
    }

    /// Resume from the pause menu.  Shares the restore path with the toggle.
    pub fn resume(&mut self) {
        if self.current_kind() == Some(PhaseKind::Paused) {
            self.toggle_pause();
        } else {
            debug!("Resume ignored: not paused");
        }
    }

    /// The player died: end the active run as a defeat.
    pub fn report_player_death(&mut self) {
        let Some(current) = self.machine.current().cloned() else {
            return;
        };
        let services = &self.services;
        let ended = current.inspect(|phase| {
            if let Some(gameplay) = phase.as_gameplay() {
                gameplay.end_run(false, services)
            } else if let Some(paused) = phase.as_paused() {
                paused
                    .resume_target()
                    .inspect(|target| target.as_gameplay().is_some_and(|g| g.end_run(false, services)))
            } else {
                false
            }
        });
        if ended {
            self.apply_pending();
        } else {
            debug!("Player death ignored outside of a run");
        }
    }

    /// Start a fresh run from the title or result screen.
    pub fn start_run(&mut self) -> FlowResult<()> {
        match self.current_kind() {
            Some(PhaseKind::Title) | Some(PhaseKind::Result) => {
                info!("Starting a new run");
                self.change_state(Some(PhaseHandle::gameplay()))
            }
            other => {
                debug!("Start run ignored in {:?}", other);
                Ok(())
            }
        }
    }

    /// Abandon whatever is active and go back to the title screen.
    pub fn return_to_title(&mut self) -> FlowResult<()> {
        if matches!(self.current_kind(), None | Some(PhaseKind::Boot)) {
            debug!("Return to title ignored before boot completes");
            return Ok(());
        }
        self.change_state(Some(PhaseHandle::title()))
    }

    pub fn current(&self) -> Option<&PhaseHandle> {
        self.machine.current()
    }

    pub fn current_kind(&self) -> Option<PhaseKind> {
        self.machine.current().map(PhaseHandle::kind)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// The result shown by the active result phase, if any.
    pub fn result_summary(&self) -> Option<RunResult> {
        self.machine
            .current()?
            .inspect(|phase| phase.as_result().map(|result| result.result()))
    }

    fn apply_pending(&mut self) {
        for _ in 0..MAX_CHAINED_TRANSITIONS {
            let Some(transition) = self.services.transitions.take() else {
                return;
            };
            debug!(
                "Applying transition to {} ({})",
                transition.target.kind(),
                transition.reason
            );
            if let Err(err) = self
                .machine
                .change_state(Some(transition.target), &mut self.services)
            {
                warn!("Transition failed: {err}");
            }
        }
        if self.services.transitions.is_pending() {
            warn!("Transition chain exceeded {MAX_CHAINED_TRANSITIONS} steps; deferring the rest");
        }
    }
}
