//! Headless scenario tests for the [`Director`] and its phases.
//!
//! No Bevy app is built here: the director is driven directly with
//! [`Director::tick`], the simulated scene host finishes each load after a
//! fixed number of ticks, and progress goes to in-memory storage.
//!
//! Covered scenarios:
//! 1. Boot reaches the title screen once the title scene is loaded.
//! 2. `change_state` rejects an absent target and ignores the active instance.
//! 3. Gameplay subscriptions mirror Enter/Exit exactly, across pauses, and
//!    signals published while paused are never observed.
//! 4. Victory fires exactly once; a run without a boss never wins by counting.
//! 5. Pause round-trips restore any time scale and the same gameplay instance.
//! 6. Scene loads are single-flight.
//! 7. Leaving the result screen saves progress; player death is a defeat;
//!    a record at the integer ceiling never overflows.
//! 8. Missing collaborators degrade to no-ops.

use std::cell::RefCell;
use std::rc::Rc;

use gameflow::config::{FlowConfig, StorageKind};
use gameflow::director::Director;
use gameflow::error::FlowError;
use gameflow::events::{BossHandle, Signal, SignalKind};
use gameflow::mode::ModeKind;
use gameflow::persistence::{MemoryStorage, PersistedRecord, StorageSelection};
use gameflow::phase::{PhaseHandle, PhaseKind};
use gameflow::scene::LoadRequest;
use gameflow::services::{Services, SharedCensus};
use gameflow::ui_stack::{OverlayCatalog, OverlayKey, PauseMenuOverlay};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn config(load_frames: u32) -> FlowConfig {
    FlowConfig {
        storage: StorageKind::Memory,
        load_frames,
        ..FlowConfig::default()
    }
}

fn services() -> Services {
    Services::from_config(&config(1))
}

fn pump(director: &mut Director, ticks: usize) {
    for _ in 0..ticks {
        director.tick();
    }
}

/// Boot and wait for the title screen.
fn booted(services: Services) -> Director {
    let mut director = Director::new(services);
    director.boot().expect("boot");
    pump(&mut director, 8);
    assert_eq!(director.current_kind(), Some(PhaseKind::Title));
    director
}

/// Start a run and wait for its setup to finish.  Returns the gameplay handle.
fn running(director: &mut Director) -> PhaseHandle {
    director.start_run().expect("start run");
    pump(director, 8);
    let gameplay = director.current().cloned().expect("active phase");
    assert_eq!(gameplay.kind(), PhaseKind::Gameplay);
    assert!(gameplay.inspect(|p| p.as_gameplay().is_some_and(|g| g.is_scene_loaded())));
    gameplay
}

fn death_listeners(director: &Director) -> usize {
    director
        .services()
        .bus
        .listener_count(SignalKind::EntityDied)
}

/// Record the kind of every `PhaseChanged` published from now on.
fn phase_log(director: &Director) -> (gameflow::events::Subscription, Rc<RefCell<Vec<PhaseKind>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sub = {
        let log = Rc::clone(&log);
        director
            .services()
            .bus
            .subscribe(SignalKind::PhaseChanged, move |signal| {
                if let Signal::PhaseChanged { phase, .. } = signal {
                    log.borrow_mut().push(*phase);
                }
            })
    };
    (sub, log)
}

// ── Phase machine ─────────────────────────────────────────────────────────────

/// Boot loads the title scene first and only then enters Title.
#[test]
fn boot_waits_for_title_scene() {
    let mut director = Director::new(Services::from_config(&config(3)));
    director.boot().unwrap();
    assert_eq!(director.current_kind(), Some(PhaseKind::Boot));

    pump(&mut director, 2);
    assert_eq!(director.current_kind(), Some(PhaseKind::Boot));
    assert_eq!(director.services().scenes.loading_scene(), Some("title"));

    pump(&mut director, 1);
    assert_eq!(director.current_kind(), Some(PhaseKind::Title));
    assert_eq!(director.services().scenes.active_scene(), Some("title"));
    assert!(director.services().currency().is_some());
    assert!(director.services().settings().is_some());
}

/// An absent target fails loudly and leaves the current phase alone.
#[test]
fn missing_target_is_rejected() {
    let mut director = booted(services());
    let title = director.current().cloned().unwrap();

    assert_eq!(director.change_state(None), Err(FlowError::MissingTarget));
    assert_eq!(director.current(), Some(&title));
    assert_eq!(title.lifecycle(), (1, 0));
}

/// Requesting the active instance is a no-op: no exit, no enter, no event.
#[test]
fn changing_to_active_instance_is_idempotent() {
    let mut director = booted(services());
    let title = director.current().cloned().unwrap();
    let (_sub, log) = phase_log(&director);

    director.change_state(Some(title.clone())).unwrap();

    assert_eq!(title.lifecycle(), (1, 0));
    assert!(log.borrow().is_empty());
}

// ── Subscriptions ─────────────────────────────────────────────────────────────

/// Every gameplay Enter subscribes and every Exit releases, pauses included.
/// Combat signals published while paused are never seen by the run.
#[test]
fn gameplay_subscriptions_mirror_lifecycle() {
    let mut director = booted(services().with_census(SharedCensus::new(2, false)));
    let gameplay = running(&mut director);
    assert_eq!(death_listeners(&director), 1);

    director.toggle_pause();
    assert_eq!(death_listeners(&director), 0);
    director.publish(Signal::EntityDied { is_boss: false });
    director.publish(Signal::BossSpawned { boss: BossHandle(7) });
    director.publish(Signal::EntityDied { is_boss: false });
    director.toggle_pause();
    assert_eq!(director.current(), Some(&gameplay));
    assert_eq!(death_listeners(&director), 1);
    gameplay.inspect(|phase| {
        let run = phase.as_gameplay().unwrap();
        assert_eq!(run.remaining_enemies(), 2);
        assert!(!run.boss_ever_spawned());
        assert!(!run.boss_alive());
    });

    director.return_to_title().unwrap();
    assert_eq!(death_listeners(&director), 0);
    assert_eq!(gameplay.lifecycle(), (2, 2));

    let stats = director.services().bus.stats();
    assert_eq!(stats.live(), 0, "leaked subscriptions: {stats:?}");
}

/// Leaving Gameplay before its scene finished loading never completes setup.
#[test]
fn setup_is_abandoned_when_gameplay_exits_mid_load() {
    let mut director = booted(Services::from_config(&config(4)));
    director.start_run().unwrap();
    let gameplay = director.current().cloned().unwrap();
    pump(&mut director, 1);

    director.return_to_title().unwrap();
    pump(&mut director, 10);

    assert!(!gameplay.inspect(|p| p.as_gameplay().is_some_and(|g| g.is_scene_loaded())));
    assert_eq!(death_listeners(&director), 0);
    assert_eq!(director.current_kind(), Some(PhaseKind::Title));
    // The title reloads once the abandoned arena load has drained.
    assert_eq!(director.services().scenes.active_scene(), Some("title"));
}

// ── Run outcome ───────────────────────────────────────────────────────────────

/// Boss spawned, then boss died with no enemies left: one victory.
#[test]
fn boss_death_after_spawn_wins_exactly_once() {
    let mut director = booted(services().with_census(SharedCensus::new(0, false)));
    running(&mut director);
    let (_sub, log) = phase_log(&director);

    director.publish(Signal::BossSpawned { boss: BossHandle(1) });
    director.publish(Signal::EntityDied { is_boss: true });

    assert_eq!(director.current_kind(), Some(PhaseKind::Result));
    let result = director.result_summary().expect("result");
    assert!(result.victory);

    director.publish(Signal::EntityDied { is_boss: true });
    director.publish(Signal::EntityDied { is_boss: false });
    assert_eq!(*log.borrow(), vec![PhaseKind::Result]);
}

/// Victory when the last minion dies after the boss.
#[test]
fn victory_when_minions_outlive_boss() {
    let mut director = booted(services().with_census(SharedCensus::new(2, true)));
    let gameplay = running(&mut director);

    director.publish(Signal::EntityDied { is_boss: true });
    director.publish(Signal::EntityDied { is_boss: false });
    assert_eq!(director.current(), Some(&gameplay));

    director.publish(Signal::EntityDied { is_boss: false });
    assert_eq!(director.current_kind(), Some(PhaseKind::Result));
}

/// Three minions, no boss ever: the count reaches zero but nobody wins.
#[test]
fn run_without_boss_does_not_win_by_counting() {
    let mut director = booted(services().with_census(SharedCensus::new(3, false)));
    let gameplay = running(&mut director);

    for _ in 0..3 {
        director.publish(Signal::EntityDied { is_boss: false });
    }

    assert_eq!(director.current(), Some(&gameplay));
    gameplay.inspect(|phase| {
        let run = phase.as_gameplay().unwrap();
        assert_eq!(run.remaining_enemies(), 0);
        assert!(!run.boss_ever_spawned());
        assert!(!run.run_ended());
    });
}

/// Player death ends the run as a defeat, even from the pause menu.
#[test]
fn player_death_is_a_defeat() {
    let mut director = booted(services());
    running(&mut director);
    director.services_mut().time_scale = 0.5;
    director.toggle_pause();
    assert_eq!(director.current_kind(), Some(PhaseKind::Paused));

    director.report_player_death();

    assert_eq!(director.current_kind(), Some(PhaseKind::Result));
    assert!(!director.result_summary().unwrap().victory);
    assert_eq!(director.services().time_scale, 0.5);
    assert!(director.services().ui.is_empty());
}

/// The result carries elapsed wall-clock time and currency earned in the run.
#[test]
fn result_measures_time_and_currency() {
    let mut director = booted(services());
    director.services().currency().unwrap().earn(100);
    running(&mut director);

    director
        .services()
        .clock
        .advance(std::time::Duration::from_secs(42));
    director.services().currency().unwrap().earn(15);
    director.report_player_death();

    let result = director.result_summary().unwrap();
    assert_eq!(result.elapsed.as_secs(), 42);
    assert_eq!(result.currency_delta, 15);
}

// ── Pause ─────────────────────────────────────────────────────────────────────

/// Pause freezes time and pushes the overlay; resume restores both.
#[test]
fn pause_round_trip_restores_time_scale() {
    for prior in [1.0_f32, 0.25, 0.0] {
        let mut director = booted(services());
        let gameplay = running(&mut director);
        director.services_mut().time_scale = prior;

        director.toggle_pause();
        assert_eq!(director.current_kind(), Some(PhaseKind::Paused));
        assert_eq!(director.services().time_scale, 0.0);
        assert_eq!(director.services().ui.depth(), 1);

        director.toggle_pause();
        assert_eq!(director.current(), Some(&gameplay));
        assert_eq!(director.services().time_scale, prior);
        assert!(director.services().ui.is_empty());
    }
}

/// The pause menu's resume button and the toggle share one restore path.
#[test]
fn menu_resume_matches_toggle() {
    let mut director = booted(services());
    let gameplay = running(&mut director);
    director.services_mut().time_scale = 0.75;

    director.toggle_pause();
    director.resume();

    assert_eq!(director.current(), Some(&gameplay));
    assert_eq!(director.services().time_scale, 0.75);
    assert!(director.services().ui.is_empty());

    // Resume outside of a pause does nothing.
    director.resume();
    assert_eq!(director.current(), Some(&gameplay));
}

/// The roguelike pause menu shows the live run.
#[test]
fn pause_overlay_shows_run_details() {
    let mut director = booted(services());
    running(&mut director);
    director.toggle_pause();

    let lines = director.services().ui.top().unwrap().overlay().lines();
    assert_eq!(lines[0], "PAUSED");
    assert!(lines.contains(&"Floor 1".to_string()));
    assert!(lines.contains(&"Abilities: dash, arc_slash".to_string()));
}

/// Toggling while the arena is still loading is ignored.
#[test]
fn pause_ignored_before_setup() {
    let mut director = booted(Services::from_config(&config(5)));
    director.start_run().unwrap();
    director.toggle_pause();
    assert_eq!(director.current_kind(), Some(PhaseKind::Gameplay));
}

/// Pause toggle on the title screen does nothing.
#[test]
fn pause_ignored_outside_gameplay() {
    let mut director = booted(services());
    let title = director.current().cloned().unwrap();
    director.toggle_pause();
    assert_eq!(director.current(), Some(&title));
}

// ── Scenes ────────────────────────────────────────────────────────────────────

/// A second load while one is in flight is rejected, not queued.
#[test]
fn scene_loads_are_single_flight() {
    let mut director = booted(Services::from_config(&config(3)));
    let (_sub, log) = {
        let log = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&log);
        let sub = director
            .services()
            .bus
            .subscribe(SignalKind::LoadStarted, move |_| *counter.borrow_mut() += 1);
        (sub, log)
    };

    assert_eq!(
        director.services_mut().load_scene("arena"),
        LoadRequest::Started
    );
    assert_eq!(
        director.services_mut().load_scene("result"),
        LoadRequest::Rejected {
            in_flight: "arena".into()
        }
    );
    pump(&mut director, 3);

    assert_eq!(*log.borrow(), 1);
    assert_eq!(director.services().scenes.active_scene(), Some("arena"));
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Leaving the result screen saves, with the outcome folded in.
#[test]
fn result_exit_saves_progress() {
    let storage = MemoryStorage::with_record(&PersistedRecord {
        highest_floor_cleared: 4,
        ..PersistedRecord::default()
    })
    .unwrap();
    let mut director = booted(
        services()
            .with_storage(StorageSelection::Memory(storage.clone()))
            .with_census(SharedCensus::new(0, true)),
    );
    running(&mut director);
    director.publish(Signal::EntityDied { is_boss: true });
    assert_eq!(director.current_kind(), Some(PhaseKind::Result));
    pump(&mut director, 3);
    assert!(director
        .current()
        .unwrap()
        .inspect(|p| p.as_result().unwrap().is_displayed()));
    let saves_before = storage.save_count();

    director.return_to_title().unwrap();

    assert_eq!(storage.save_count(), saves_before + 1);
    assert_eq!(storage.stored().unwrap().highest_floor_cleared, 5);
}

/// A defeat still saves on exit but does not advance progress.
#[test]
fn defeat_saves_without_progress() {
    let storage = MemoryStorage::new();
    let mut director = booted(services().with_storage(StorageSelection::Memory(storage.clone())));
    running(&mut director);
    director.report_player_death();

    director.start_run().unwrap();

    assert_eq!(storage.save_count(), 1);
    assert_eq!(storage.stored().unwrap().highest_floor_cleared, 0);
    assert_eq!(director.current_kind(), Some(PhaseKind::Gameplay));
}

/// A record at the integer ceiling still starts runs and folds victories.
#[test]
fn maxed_out_record_survives_runs_in_both_modes() {
    for mode in [ModeKind::Roguelike, ModeKind::Story] {
        let storage = MemoryStorage::with_record(&PersistedRecord {
            highest_floor_cleared: u32::MAX,
            story_chapter_unlocked: u32::MAX,
            ..PersistedRecord::default()
        })
        .unwrap();
        let services = Services::from_config(&FlowConfig {
            mode,
            ..config(1)
        })
        .with_storage(StorageSelection::Memory(storage.clone()))
        .with_census(SharedCensus::new(0, true));
        let mut director = booted(services);
        running(&mut director);

        director.publish(Signal::EntityDied { is_boss: true });
        assert!(director.result_summary().unwrap().victory);
        director.return_to_title().unwrap();

        let stored = storage.stored().unwrap();
        assert_eq!(stored.highest_floor_cleared, u32::MAX, "{mode:?}");
        assert_eq!(stored.story_chapter_unlocked, u32::MAX, "{mode:?}");
    }
}

// ── Degraded collaborators ────────────────────────────────────────────────────

/// Without a scene host, loads are skipped and the flow still advances.
#[test]
fn missing_scene_host_still_boots() {
    let mut director = Director::new(services().with_scene_host(None));
    director.boot().unwrap();
    pump(&mut director, 1);
    assert_eq!(director.current_kind(), Some(PhaseKind::Title));

    director.start_run().unwrap();
    assert!(director
        .current()
        .unwrap()
        .inspect(|p| p.as_gameplay().unwrap().is_scene_loaded()));
}

/// An unregistered pause prefab still freezes time; nothing is pushed.
#[test]
fn missing_pause_overlay_still_pauses() {
    let mut director = booted(services().with_overlays(OverlayCatalog::default()));
    let gameplay = running(&mut director);

    director.toggle_pause();
    assert_eq!(director.services().time_scale, 0.0);
    assert!(director.services().ui.is_empty());

    director.toggle_pause();
    assert_eq!(director.current(), Some(&gameplay));
    assert_eq!(director.services().time_scale, 1.0);
}

/// A pause menu handed the wrong context variant renders nothing but is
/// still pushed and popped normally.
#[test]
fn mismatched_pause_context_is_tolerated() {
    let mut overlays = OverlayCatalog::default();
    overlays.register(OverlayKey::STORY_PAUSE, || {
        Box::new(PauseMenuOverlay::new(ModeKind::Roguelike))
    });
    let config = FlowConfig {
        mode: ModeKind::Story,
        ..config(1)
    };
    let mut director = booted(Services::from_config(&config).with_overlays(overlays));
    running(&mut director);

    director.toggle_pause();
    let top = director.services().ui.top().expect("overlay pushed");
    assert!(top.overlay().lines().is_empty());

    director.toggle_pause();
    assert!(director.services().ui.is_empty());
}
