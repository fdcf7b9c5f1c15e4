//! Dependency-injected service context handed to every phase.
//!
//! [`Services`] is constructed once by the application bootstrap and owned by
//! the [`crate::director::Director`].  The currency ledger, settings store and
//! camera-shake coordinator start out absent: only the boot phase creates
//! them (see [`Services::ensure_runtime_services`]).

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bevy::log::{debug, warn};

use crate::config::FlowConfig;
use crate::constants::NORMAL_TIME_SCALE;
use crate::events::{EventBus, Signal};
use crate::mode::{mode_from_config, GameMode};
use crate::persistence::{PersistenceFacade, Settings, StorageSelection};
use crate::phase::{PhaseId, TransitionSlot};
use crate::scene::{LoadRequest, LoadingScreen, SceneHost, SceneLoader, SimulatedSceneHost};
use crate::scheduler::{Scheduler, SceneLoadTask};
use crate::ui_stack::{OverlayCatalog, UiStack};

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Shared wall clock, advanced by the host every frame.
#[derive(Debug, Clone, Default)]
pub struct WallClock {
    now: Rc<Cell<Duration>>,
}

impl WallClock {
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

/// Read-only view of the combat world used to seed run counters.
pub trait EnemyCensus {
    /// Alive enemies, bosses excluded.
    fn alive_enemies(&self) -> u32;
    fn boss_present(&self) -> bool;
}

/// Census backed by shared cells; the combat layer writes, the core reads.
#[derive(Debug, Clone, Default)]
pub struct SharedCensus {
    enemies: Rc<Cell<u32>>,
    boss: Rc<Cell<bool>>,
}

impl SharedCensus {
    pub fn new(enemies: u32, boss: bool) -> Self {
        let census = Self::default();
        census.set_enemies(enemies);
        census.set_boss(boss);
        census
    }

    pub fn set_enemies(&self, enemies: u32) {
        self.enemies.set(enemies);
    }

    pub fn set_boss(&self, present: bool) {
        self.boss.set(present);
    }
}

impl EnemyCensus for SharedCensus {
    fn alive_enemies(&self) -> u32 {
        self.enemies.get()
    }

    fn boss_present(&self) -> bool {
        self.boss.get()
    }
}

/// Engine camera able to play a shake.
pub trait CameraRig {
    fn shake(&mut self, intensity: f32);
}

// ── Runtime services (created by boot) ────────────────────────────────────────

/// Player currency.  Clones share one balance.
#[derive(Clone)]
pub struct CurrencyLedger {
    balance: Rc<Cell<i64>>,
    bus: EventBus,
}

impl CurrencyLedger {
    pub fn new(bus: EventBus) -> Self {
        Self {
            balance: Rc::new(Cell::new(0)),
            bus,
        }
    }

    pub fn balance(&self) -> i64 {
        self.balance.get()
    }

    pub fn earn(&self, amount: i64) {
        self.adjust(amount);
    }

    /// Returns `false` without changing anything if the balance is too low.
    pub fn spend(&self, amount: i64) -> bool {
        if amount > self.balance.get() {
            return false;
        }
        self.adjust(-amount);
        true
    }

    fn adjust(&self, delta: i64) {
        let balance = self.balance.get() + delta;
        self.balance.set(balance);
        self.bus.publish(&Signal::CurrencyChanged { balance, delta });
    }
}

/// Effective mixer levels after mute and master scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub master: f32,
    pub bgm: f32,
    pub sfx: f32,
}

/// Applies the persisted settings sub-record to the running game.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    audio: AudioLevels,
    screen_shake: bool,
    show_damage_numbers: bool,
}

impl SettingsStore {
    pub fn apply(&mut self, settings: &Settings) {
        let master = if settings.mute_all {
            0.0
        } else {
            settings.master_volume.clamp(0.0, 1.0)
        };
        self.audio = AudioLevels {
            master,
            bgm: master * settings.bgm_volume.clamp(0.0, 1.0),
            sfx: master * settings.sfx_volume.clamp(0.0, 1.0),
        };
        self.screen_shake = settings.screen_shake;
        self.show_damage_numbers = settings.show_damage_numbers;
        debug!("Applied settings: {:?}", self.audio);
    }

    pub fn audio(&self) -> AudioLevels {
        self.audio
    }

    pub fn screen_shake(&self) -> bool {
        self.screen_shake
    }

    pub fn show_damage_numbers(&self) -> bool {
        self.show_damage_numbers
    }
}

/// Routes shake requests to the camera rig, honouring the screen-shake setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraShakeCoordinator {
    enabled: bool,
}

impl CameraShakeCoordinator {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Scene names the phases load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneNames {
    pub title: String,
    pub gameplay: String,
    pub result: String,
}

pub struct Services {
    pub bus: EventBus,
    pub persistence: PersistenceFacade,
    pub scenes: SceneLoader,
    pub ui: UiStack,
    pub overlays: OverlayCatalog,
    pub tasks: Scheduler,
    pub transitions: TransitionSlot,
    pub clock: WallClock,
    pub mode: Box<dyn GameMode>,
    pub scene_names: SceneNames,
    /// Global virtual-time multiplier; `0.0` freezes time-scaled motion.
    pub time_scale: f32,
    census: Option<Box<dyn EnemyCensus>>,
    camera_rig: Option<Box<dyn CameraRig>>,
    currency: Option<CurrencyLedger>,
    settings: Option<SettingsStore>,
    camera: Option<CameraShakeCoordinator>,
    active_phase: Option<PhaseId>,
}

impl Services {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            bus: EventBus::new(),
            persistence: PersistenceFacade::new(config.storage_selection()),
            scenes: SceneLoader::new(Some(Box::new(SimulatedSceneHost::new(config.load_frames)))),
            ui: UiStack::default(),
            overlays: OverlayCatalog::with_pause_menus(),
            tasks: Scheduler::default(),
            transitions: TransitionSlot::default(),
            clock: WallClock::default(),
            mode: mode_from_config(config),
            scene_names: SceneNames {
                title: config.title_scene.clone(),
                gameplay: config.gameplay_scene.clone(),
                result: config.result_scene.clone(),
            },
            time_scale: NORMAL_TIME_SCALE,
            census: None,
            camera_rig: None,
            currency: None,
            settings: None,
            camera: None,
            active_phase: None,
        }
    }

    pub fn with_storage(mut self, selection: StorageSelection) -> Self {
        self.persistence = PersistenceFacade::new(selection);
        self
    }

    pub fn with_census(mut self, census: impl EnemyCensus + 'static) -> Self {
        self.census = Some(Box::new(census));
        self
    }

    /// Attach a census after construction (the Bevy host wires it at startup).
    pub fn set_census(&mut self, census: impl EnemyCensus + 'static) {
        self.census = Some(Box::new(census));
    }

    pub fn with_scene_host(mut self, host: Option<Box<dyn SceneHost>>) -> Self {
        self.scenes.set_host(host);
        self
    }

    pub fn with_loading_screen(mut self, screen: impl LoadingScreen + 'static) -> Self {
        self.scenes.set_loading_screen(Some(Box::new(screen)));
        self
    }

    pub fn with_mode(mut self, mode: impl GameMode + 'static) -> Self {
        self.mode = Box::new(mode);
        self
    }

    pub fn with_camera_rig(mut self, rig: impl CameraRig + 'static) -> Self {
        self.camera_rig = Some(Box::new(rig));
        self
    }

    pub fn with_overlays(mut self, overlays: OverlayCatalog) -> Self {
        self.overlays = overlays;
        self
    }

    /// Request a scene load and keep it progressing on the scheduler.
    pub fn load_scene(&mut self, scene: &str) -> LoadRequest {
        let request = self.scenes.load_scene_async(scene, &self.bus);
        if request == LoadRequest::Started {
            self.tasks.spawn(SceneLoadTask);
        }
        request
    }

    /// Create the process-wide runtime services if they do not exist yet.
    pub fn ensure_runtime_services(&mut self) {
        if self.currency.is_none() {
            self.currency = Some(CurrencyLedger::new(self.bus.clone()));
        }
        if self.settings.is_none() {
            self.settings = Some(SettingsStore::default());
        }
        if self.camera.is_none() {
            self.camera = Some(CameraShakeCoordinator::default());
        }
    }

    /// Push the persisted settings into the settings store and camera coordinator.
    pub fn apply_loaded_settings(&mut self) {
        let settings = self.persistence.record().settings.clone();
        match self.settings.as_mut() {
            Some(store) => store.apply(&settings),
            None => warn!("Settings store missing; settings not applied"),
        }
        if let Some(camera) = self.camera.as_mut() {
            camera.set_enabled(settings.screen_shake);
        }
    }

    /// Replace, apply and persist the player's settings.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.persistence.apply_settings(settings);
        self.apply_loaded_settings();
    }

    pub fn currency(&self) -> Option<&CurrencyLedger> {
        self.currency.as_ref()
    }

    pub fn currency_balance(&self) -> i64 {
        self.currency.as_ref().map_or(0, CurrencyLedger::balance)
    }

    pub fn settings(&self) -> Option<&SettingsStore> {
        self.settings.as_ref()
    }

    pub fn camera(&self) -> Option<&CameraShakeCoordinator> {
        self.camera.as_ref()
    }

    /// Shake the camera if enabled.  A missing rig is a logged no-op.
    pub fn shake_camera(&mut self, intensity: f32) {
        let Some(camera) = self.camera else {
            warn!("Camera-shake coordinator missing; ignoring shake");
            return;
        };
        if !camera.is_enabled() {
            return;
        }
        match self.camera_rig.as_mut() {
            Some(rig) => rig.shake(intensity),
            None => warn!("No camera rig attached; ignoring shake"),
        }
    }

    /// Current `(alive non-boss enemies, boss present)`; zeros if no census.
    pub fn census(&self) -> (u32, bool) {
        match self.census.as_ref() {
            Some(census) => (census.alive_enemies(), census.boss_present()),
            None => {
                warn!("No enemy census attached; assuming an empty arena");
                (0, false)
            }
        }
    }

    pub fn active_phase(&self) -> Option<PhaseId> {
        self.active_phase
    }

    pub(crate) fn set_active_phase(&mut self, id: Option<PhaseId>) {
        self.active_phase = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SignalKind;
    use crate::persistence::MemoryStorage;
    use std::cell::RefCell;

    #[test]
    fn ledger_clones_share_balance_and_publish_changes() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let seen = Rc::clone(&seen);
            bus.subscribe(SignalKind::CurrencyChanged, move |s| seen.borrow_mut().push(s.clone()))
        };

        let ledger = CurrencyLedger::new(bus.clone());
        let other = ledger.clone();
        ledger.earn(25);
        assert!(other.spend(10));
        assert!(!other.spend(100));

        assert_eq!(ledger.balance(), 15);
        assert_eq!(
            *seen.borrow(),
            vec![
                Signal::CurrencyChanged {
                    balance: 25,
                    delta: 25
                },
                Signal::CurrencyChanged {
                    balance: 15,
                    delta: -10
                },
            ]
        );
    }

    #[test]
    fn mute_silences_every_channel() {
        let mut store = SettingsStore::default();
        store.apply(&Settings {
            mute_all: true,
            ..Settings::default()
        });
        assert_eq!(store.audio(), AudioLevels::default());
    }

    #[test]
    fn channel_volumes_scale_with_master() {
        let mut store = SettingsStore::default();
        store.apply(&Settings {
            master_volume: 0.5,
            bgm_volume: 0.5,
            sfx_volume: 1.0,
            ..Settings::default()
        });
        assert_eq!(
            store.audio(),
            AudioLevels {
                master: 0.5,
                bgm: 0.25,
                sfx: 0.5
            }
        );
    }

    #[test]
    fn shake_reaches_rig_only_when_enabled() {
        struct Rig(Rc<Cell<u32>>);
        impl CameraRig for Rig {
            fn shake(&mut self, _intensity: f32) {
                self.0.set(self.0.get() + 1);
            }
        }

        let shakes = Rc::new(Cell::new(0));
        let mut services = Services::from_config(&FlowConfig::default())
            .with_storage(StorageSelection::Memory(MemoryStorage::new()))
            .with_camera_rig(Rig(Rc::clone(&shakes)));

        // Not created yet: logged no-op.
        services.shake_camera(1.0);
        assert_eq!(shakes.get(), 0);

        services.ensure_runtime_services();
        services.apply_loaded_settings();
        services.shake_camera(1.0);
        assert_eq!(shakes.get(), 1);

        services.apply_settings(Settings {
            screen_shake: false,
            ..Settings::default()
        });
        services.shake_camera(1.0);
        assert_eq!(shakes.get(), 1);
    }

    #[test]
    fn missing_census_reads_as_empty_arena() {
        let services = Services::from_config(&FlowConfig::default());
        assert_eq!(services.census(), (0, false));

        let census = SharedCensus::new(3, true);
        let services = Services::from_config(&FlowConfig::default()).with_census(census.clone());
        assert_eq!(services.census(), (3, true));
        census.set_enemies(1);
        assert_eq!(services.census(), (1, true));
    }
}
