use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bevy::log::{debug, info};

use crate::events::{Signal, SignalKind, Subscription};
use crate::mode::RunSnapshot;
use crate::scene::LoadRequest;
use crate::scheduler::SceneGate;
use crate::services::{CurrencyLedger, Services, WallClock};

use super::{
    PausedPhase, Phase, PhaseBehavior, PhaseContext, PhaseHandle, RunResult, Transition,
    TransitionSlot,
};

/// Run-outcome counters, shared between the gameplay phase and its listeners.
pub struct RunTracker {
    remaining_enemies: u32,
    boss_alive: bool,
    boss_ever_spawned: bool,
    started_at: Duration,
    start_balance: i64,
    ended: bool,
    clock: WallClock,
    ledger: Option<CurrencyLedger>,
}

impl RunTracker {
    pub fn start(
        remaining_enemies: u32,
        boss_present: bool,
        clock: WallClock,
        ledger: Option<CurrencyLedger>,
    ) -> Self {
        Self {
            remaining_enemies,
            boss_alive: boss_present,
            boss_ever_spawned: boss_present,
            started_at: clock.now(),
            start_balance: ledger.as_ref().map_or(0, CurrencyLedger::balance),
            ended: false,
            clock,
            ledger,
        }
    }

    pub fn remaining_enemies(&self) -> u32 {
        self.remaining_enemies
    }

    pub fn boss_alive(&self) -> bool {
        self.boss_alive
    }

    pub fn boss_ever_spawned(&self) -> bool {
        self.boss_ever_spawned
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn record_boss_spawn(&mut self) {
        if self.ended {
            return;
        }
        self.boss_alive = true;
        self.boss_ever_spawned = true;
    }

    /// Apply one death.  Returns the result if this death won the run.
    ///
    /// A run without any boss never wins through counting alone.
    pub fn record_death(&mut self, is_boss: bool) -> Option<RunResult> {
        if self.ended {
            return None;
        }
        if is_boss {
            self.boss_alive = false;
        } else {
            self.remaining_enemies = self.remaining_enemies.saturating_sub(1);
        }
        debug!(
            "Death recorded: {} enemies left, boss alive {}",
            self.remaining_enemies, self.boss_alive
        );

        if self.boss_ever_spawned && !self.boss_alive && self.remaining_enemies == 0 {
            self.finish(true)
        } else {
            None
        }
    }

    /// End the run.  Only the first call produces a result.
    pub fn finish(&mut self, victory: bool) -> Option<RunResult> {
        if self.ended {
            return None;
        }
        self.ended = true;
        let snapshot = self.snapshot();
        Some(RunResult {
            victory,
            elapsed: snapshot.elapsed,
            currency_delta: snapshot.currency_earned,
        })
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            elapsed: self.clock.now().saturating_sub(self.started_at),
            currency_earned: self.ledger.as_ref().map_or(0, CurrencyLedger::balance)
                - self.start_balance,
        }
    }
}

/// The active run.
///
/// The scene load, mode initialization and counter capture happen once per
/// instance.  Returning from a pause re-enters the same instance, which only
/// re-subscribes to combat signals.
#[derive(Default)]
pub struct GameplayPhase {
    scene_loaded: bool,
    tracker: Option<Rc<RefCell<RunTracker>>>,
    subscriptions: Vec<Subscription>,
}

impl GameplayPhase {
    pub fn is_scene_loaded(&self) -> bool {
        self.scene_loaded
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn remaining_enemies(&self) -> u32 {
        self.tracker
            .as_ref()
            .map_or(0, |tracker| tracker.borrow().remaining_enemies())
    }

    pub fn boss_alive(&self) -> bool {
        self.tracker
            .as_ref()
            .is_some_and(|tracker| tracker.borrow().boss_alive())
    }

    pub fn boss_ever_spawned(&self) -> bool {
        self.tracker
            .as_ref()
            .is_some_and(|tracker| tracker.borrow().boss_ever_spawned())
    }

    pub fn run_ended(&self) -> bool {
        self.tracker
            .as_ref()
            .is_some_and(|tracker| tracker.borrow().has_ended())
    }

    pub fn snapshot(&self) -> Option<RunSnapshot> {
        self.tracker.as_ref().map(|tracker| tracker.borrow().snapshot())
    }

    /// Ask to pause this run.  Ignored until setup has finished and after the
    /// run has ended.
    pub fn request_pause(&self, services: &Services, this: &PhaseHandle) -> bool {
        let Some(tracker) = self.tracker.as_ref() else {
            debug!("Pause ignored: run not set up yet");
            return false;
        };
        let tracker = tracker.borrow();
        if tracker.has_ended() {
            debug!("Pause ignored: run already ended");
            return false;
        }
        let context = services.mode.pause_context(&tracker.snapshot());
        let paused = PausedPhase::new(context, this.clone(), Some(services.mode.pause_overlay()));
        services
            .transitions
            .request(Transition::to(PhaseHandle::new(Phase::Paused(paused)), "pause"))
    }

    /// End the run from outside the counting logic (e.g. player death).
    pub fn end_run(&self, victory: bool, services: &Services) -> bool {
        let Some(tracker) = self.tracker.as_ref() else {
            debug!("End of run ignored: run not set up yet");
            return false;
        };
        let Some(result) = tracker.borrow_mut().finish(victory) else {
            return false;
        };
        request_result(&services.transitions, result)
    }

    /// Load the gameplay scene, or finish setup if nothing needs loading.
    ///
    /// A rejected request waits for the other load and then tries again.
    fn load_or_finish(&mut self, services: &mut Services, this: &PhaseHandle) {
        let scene = services.scene_names.gameplay.clone();
        match services.load_scene(&scene) {
            LoadRequest::AlreadyLoaded | LoadRequest::Unavailable => self.finish_setup(services),
            LoadRequest::Started | LoadRequest::Rejected { .. } => {
                let handle = this.clone();
                services.tasks.spawn(SceneGate::new(
                    "gameplay-setup-gate",
                    this.id(),
                    move |services| {
                        handle.with_context(services, |phase, cx| {
                            if let Phase::Gameplay(gameplay) = phase {
                                gameplay.load_or_finish(cx.services, cx.this);
                            }
                        });
                    },
                ));
            }
        }
    }

    fn finish_setup(&mut self, services: &mut Services) {
        services.mode.initialize_run(services.persistence.record());
        let (enemies, boss) = services.census();
        let tracker = RunTracker::start(
            enemies,
            boss,
            services.clock.clone(),
            services.currency().cloned(),
        );
        info!("Run started: {enemies} enemies, boss present {boss}");
        self.tracker = Some(Rc::new(RefCell::new(tracker)));
        self.scene_loaded = true;
        self.subscribe(services);
    }

    fn subscribe(&mut self, services: &Services) {
        let Some(tracker) = self.tracker.as_ref() else {
            return;
        };

        let deaths = {
            let tracker = Rc::clone(tracker);
            let slot = services.transitions.clone();
            services.bus.subscribe(SignalKind::EntityDied, move |signal| {
                let Signal::EntityDied { is_boss } = signal else {
                    return;
                };
                let won = tracker.borrow_mut().record_death(*is_boss);
                if let Some(result) = won {
                    request_result(&slot, result);
                }
            })
        };
        let bosses = {
            let tracker = Rc::clone(tracker);
            services.bus.subscribe(SignalKind::BossSpawned, move |signal| {
                if let Signal::BossSpawned { boss } = signal {
                    debug!("Boss {:?} spawned", boss);
                    tracker.borrow_mut().record_boss_spawn();
                }
            })
        };
        self.subscriptions = vec![deaths, bosses];
    }
}

fn request_result(slot: &TransitionSlot, result: RunResult) -> bool {
    info!(
        "Run ended in {}",
        if result.victory { "victory" } else { "defeat" }
    );
    slot.request(Transition::to(PhaseHandle::result(result), "run ended"))
}

impl PhaseBehavior for GameplayPhase {
    fn enter(&mut self, cx: &mut PhaseContext<'_>) {
        if self.scene_loaded {
            self.subscribe(cx.services);
            return;
        }
        self.load_or_finish(cx.services, cx.this);
    }

    fn exit(&mut self, _cx: &mut PhaseContext<'_>) {
        self.subscriptions.clear();
    }
}
