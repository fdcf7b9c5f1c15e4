//! Application phases and the handles the state machine uses to own them.
//!
//! ## Phases
//!
//! | Phase      | Enter                                         | Exit                         |
//! |------------|-----------------------------------------------|------------------------------|
//! | `Boot`     | Load persistence, create services, load title | —                            |
//! | `Title`    | Reset time scale, load title scene            | —                            |
//! | `Gameplay` | Load arena once, seed run counters, subscribe | Release subscriptions        |
//! | `Paused`   | Freeze time, push pause overlay               | Restore time, pop overlay    |
//! | `Result`   | Fold outcome into progress, load result scene | Save progress                |
//!
//! A [`PhaseHandle`] gives each phase instance an identity.  Two handles are
//! equal only if they point at the same instance, never merely the same kind.

mod boot;
mod gameplay;
mod machine;
mod paused;
mod result;
mod title;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy::log::warn;

use crate::services::Services;

pub use boot::BootPhase;
pub use gameplay::{GameplayPhase, RunTracker};
pub use machine::PhaseMachine;
pub use paused::PausedPhase;
pub use result::{ResultPhase, RunResult};
pub use title::TitlePhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Boot,
    Title,
    Gameplay,
    Paused,
    Result,
}

impl PhaseKind {
    pub fn label(self) -> &'static str {
        match self {
            PhaseKind::Boot => "boot",
            PhaseKind::Title => "title",
            PhaseKind::Gameplay => "gameplay",
            PhaseKind::Paused => "paused",
            PhaseKind::Result => "result",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unique identity of one phase instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseId(u64);

static NEXT_PHASE_ID: AtomicU64 = AtomicU64::new(1);

impl PhaseId {
    fn next() -> Self {
        PhaseId(NEXT_PHASE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a phase gets while the machine is calling into it.
pub struct PhaseContext<'a> {
    pub services: &'a mut Services,
    /// Handle of the phase being called, for capturing as a resume target or
    /// in continuations.
    pub this: &'a PhaseHandle,
}

/// Enter / Exit / Tick contract.  Every hook defaults to a no-op.
pub trait PhaseBehavior {
    fn enter(&mut self, _cx: &mut PhaseContext<'_>) {}
    fn exit(&mut self, _cx: &mut PhaseContext<'_>) {}
    fn tick(&mut self, _cx: &mut PhaseContext<'_>) {}
}

pub enum Phase {
    Boot(BootPhase),
    Title(TitlePhase),
    Gameplay(GameplayPhase),
    Paused(PausedPhase),
    Result(ResultPhase),
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Boot(_) => PhaseKind::Boot,
            Phase::Title(_) => PhaseKind::Title,
            Phase::Gameplay(_) => PhaseKind::Gameplay,
            Phase::Paused(_) => PhaseKind::Paused,
            Phase::Result(_) => PhaseKind::Result,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn PhaseBehavior {
        match self {
            Phase::Boot(phase) => phase,
            Phase::Title(phase) => phase,
            Phase::Gameplay(phase) => phase,
            Phase::Paused(phase) => phase,
            Phase::Result(phase) => phase,
        }
    }

    pub fn as_gameplay(&self) -> Option<&GameplayPhase> {
        match self {
            Phase::Gameplay(phase) => Some(phase),
            _ => None,
        }
    }

    pub fn as_paused(&self) -> Option<&PausedPhase> {
        match self {
            Phase::Paused(phase) => Some(phase),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&ResultPhase> {
        match self {
            Phase::Result(phase) => Some(phase),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    enters: Cell<u32>,
    exits: Cell<u32>,
}

/// Shared, identity-carrying handle to a phase instance.
#[derive(Clone)]
pub struct PhaseHandle {
    id: PhaseId,
    kind: PhaseKind,
    cell: Rc<RefCell<Phase>>,
    lifecycle: Rc<Lifecycle>,
}

impl PhaseHandle {
    pub fn new(phase: Phase) -> Self {
        Self {
            id: PhaseId::next(),
            kind: phase.kind(),
            cell: Rc::new(RefCell::new(phase)),
            lifecycle: Rc::default(),
        }
    }

    pub fn boot() -> Self {
        Self::new(Phase::Boot(BootPhase::default()))
    }

    pub fn title() -> Self {
        Self::new(Phase::Title(TitlePhase::default()))
    }

    pub fn gameplay() -> Self {
        Self::new(Phase::Gameplay(GameplayPhase::default()))
    }

    pub fn result(result: RunResult) -> Self {
        Self::new(Phase::Result(ResultPhase::new(result)))
    }

    pub fn id(&self) -> PhaseId {
        self.id
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// `(enter calls, exit calls)` made on this instance so far.
    pub fn lifecycle(&self) -> (u32, u32) {
        (self.lifecycle.enters.get(), self.lifecycle.exits.get())
    }

    /// Inspect the phase.  Must not be called while the phase is executing.
    pub fn inspect<R>(&self, f: impl FnOnce(&Phase) -> R) -> R {
        f(&*self.cell.borrow())
    }

    pub(crate) fn with_context<R>(
        &self,
        services: &mut Services,
        f: impl FnOnce(&mut Phase, &mut PhaseContext<'_>) -> R,
    ) -> R {
        let mut phase = self.cell.borrow_mut();
        let mut cx = PhaseContext {
            services,
            this: self,
        };
        f(&mut *phase, &mut cx)
    }

    pub(crate) fn enter(&self, services: &mut Services) {
        self.lifecycle.enters.set(self.lifecycle.enters.get() + 1);
        self.with_context(services, |phase, cx| phase.behavior_mut().enter(cx));
    }

    pub(crate) fn exit(&self, services: &mut Services) {
        self.lifecycle.exits.set(self.lifecycle.exits.get() + 1);
        self.with_context(services, |phase, cx| phase.behavior_mut().exit(cx));
    }

    pub(crate) fn tick(&self, services: &mut Services) {
        self.with_context(services, |phase, cx| phase.behavior_mut().tick(cx));
    }
}

impl PartialEq for PhaseHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for PhaseHandle {}

impl fmt::Debug for PhaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A request to make `target` the active phase.
#[derive(Debug, Clone)]
pub struct Transition {
    pub target: PhaseHandle,
    pub reason: &'static str,
}

impl Transition {
    pub fn to(target: PhaseHandle, reason: &'static str) -> Self {
        Self { target, reason }
    }
}

/// Holds at most one transition requested from inside a dispatch.
///
/// The director applies it as soon as the current tick, signal or trigger
/// returns.  A second request while one is pending is rejected, not queued.
#[derive(Clone, Default)]
pub struct TransitionSlot {
    pending: Rc<RefCell<Option<Transition>>>,
}

impl TransitionSlot {
    pub fn request(&self, transition: Transition) -> bool {
        let mut pending = self.pending.borrow_mut();
        if let Some(existing) = pending.as_ref() {
            warn!(
                "Transition to {} ({}) rejected: {} ({}) already pending",
                transition.target.kind(),
                transition.reason,
                existing.target.kind(),
                existing.reason
            );
            return false;
        }
        *pending = Some(transition);
        true
    }

    pub fn take(&self) -> Option<Transition> {
        self.pending.borrow_mut().take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_instance_not_kind() {
        let a = PhaseHandle::title();
        let b = PhaseHandle::title();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), b.kind());
    }

    #[test]
    fn slot_rejects_second_request() {
        let slot = TransitionSlot::default();
        assert!(slot.request(Transition::to(PhaseHandle::title(), "first")));
        assert!(!slot.request(Transition::to(PhaseHandle::gameplay(), "second")));

        let taken = slot.take().expect("first request kept");
        assert_eq!(taken.reason, "first");
        assert!(!slot.is_pending());
    }
}
