//! Cooperative task scheduler.
//!
//! A [`Task`] is polled once per host tick and answers [`TaskStatus::Pending`]
//! until it is finished, then [`TaskStatus::Complete`] exactly once.  Tasks are
//! polled in registration order and are never cancelled; a task spawned while
//! the scheduler is polling first runs on the following tick.

use bevy::log::debug;

use crate::phase::PhaseId;
use crate::services::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Complete,
}

pub trait Task {
    fn name(&self) -> &str;
    fn poll(&mut self, services: &mut Services) -> TaskStatus;
}

/// Keeps the scene loader progressing; completes once no load is in flight.
pub struct SceneLoadTask;

impl Task for SceneLoadTask {
    fn name(&self) -> &str {
        "scene-load"
    }

    fn poll(&mut self, services: &mut Services) -> TaskStatus {
        services.scenes.poll(&services.bus);
        if services.scenes.is_busy() {
            TaskStatus::Pending
        } else {
            TaskStatus::Complete
        }
    }
}

type Continuation = Box<dyn FnOnce(&mut Services)>;

/// Suspends a phase's setup until the scene loader is idle.
///
/// The continuation only runs if its owning phase is still the active one;
/// a phase that exits mid-load never completes its setup.
pub struct SceneGate {
    label: String,
    owner: PhaseId,
    then: Option<Continuation>,
}

impl SceneGate {
    pub fn new(
        label: impl Into<String>,
        owner: PhaseId,
        then: impl FnOnce(&mut Services) + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            owner,
            then: Some(Box::new(then)),
        }
    }
}

impl Task for SceneGate {
    fn name(&self) -> &str {
        &self.label
    }

    fn poll(&mut self, services: &mut Services) -> TaskStatus {
        if services.scenes.is_busy() {
            return TaskStatus::Pending;
        }
        if let Some(then) = self.then.take() {
            if services.active_phase() == Some(self.owner) {
                then(services);
            } else {
                debug!("{}: owner {:?} left before load finished", self.label, self.owner);
            }
        }
        TaskStatus::Complete
    }
}

#[derive(Default)]
pub struct Scheduler {
    live: Vec<Box<dyn Task>>,
}

impl Scheduler {
    pub fn spawn(&mut self, task: impl Task + 'static) {
        self.live.push(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.live.iter().map(|task| task.name().to_string()).collect()
    }
}

/// Poll every live task once, in registration order.
pub fn run_tasks(services: &mut Services) {
    let polled = std::mem::take(&mut services.tasks.live);
    let mut survivors = Vec::with_capacity(polled.len());
    for mut task in polled {
        match task.poll(services) {
            TaskStatus::Pending => survivors.push(task),
            TaskStatus::Complete => debug!("task '{}' complete", task.name()),
        }
    }
    // Anything spawned during polling goes after the survivors.
    survivors.append(&mut services.tasks.live);
    services.tasks.live = survivors;
}
