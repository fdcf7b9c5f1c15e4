use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bevy::log::info;

use crate::scheduler::SceneGate;

use super::{PhaseBehavior, PhaseContext};

/// Outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunResult {
    pub victory: bool,
    pub elapsed: Duration,
    pub currency_delta: i64,
}

#[derive(Debug)]
pub struct ResultPhase {
    result: RunResult,
    displayed: Rc<Cell<bool>>,
}

impl ResultPhase {
    pub fn new(result: RunResult) -> Self {
        Self {
            result,
            displayed: Rc::default(),
        }
    }

    pub fn result(&self) -> RunResult {
        self.result
    }

    /// Whether the summary has been shown (the result scene finished loading).
    pub fn is_displayed(&self) -> bool {
        self.displayed.get()
    }
}

impl PhaseBehavior for ResultPhase {
    fn enter(&mut self, cx: &mut PhaseContext<'_>) {
        let services = &mut *cx.services;
        services
            .mode
            .apply_outcome(&self.result, services.persistence.record_mut());

        let scene = services.scene_names.result.clone();
        services.load_scene(&scene);

        let result = self.result;
        let displayed = Rc::clone(&self.displayed);
        services.tasks.spawn(SceneGate::new(
            "result-display-gate",
            cx.this.id(),
            move |_| {
                displayed.set(true);
                info!(
                    "Run {} after {:.1}s, currency {:+}",
                    if result.victory { "won" } else { "lost" },
                    result.elapsed.as_secs_f32(),
                    result.currency_delta
                );
            },
        ));
    }

    fn exit(&mut self, cx: &mut PhaseContext<'_>) {
        cx.services.persistence.checkpoint("result exit");
    }
}
