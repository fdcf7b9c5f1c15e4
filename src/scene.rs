//! Single-flight asynchronous scene loading.
//!
//! [`SceneLoader::load_scene_async`] admits at most one load at a time.  The
//! load itself is driven by [`SceneLoader::poll`], which the scheduler calls
//! once per tick until the host reports completion; the loader never blocks.
//!
//! ## Signals
//!
//! | Signal          | When                                         |
//! |-----------------|----------------------------------------------|
//! | `LoadStarted`   | A request is admitted                        |
//! | `LoadProgress`  | Every poll while in flight, value in `[0,1]` |
//! | `LoadCompleted` | The poll on which the host reports done      |

use bevy::log::{debug, info, warn};

use crate::events::{EventBus, Signal};

/// Result of polling a host-level load operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadPoll {
    InProgress(f32),
    Done,
}

/// One engine-level scene load, started by a [`SceneHost`].
pub trait SceneLoadOperation {
    fn poll(&mut self) -> LoadPoll;
}

/// Engine primitive that begins scene loads.
pub trait SceneHost {
    fn begin_load(&mut self, scene: &str) -> Box<dyn SceneLoadOperation>;
}

/// Optional loading indicator collaborator.
pub trait LoadingScreen {
    fn show(&mut self, scene: &str);
    fn set_progress(&mut self, progress: f32);
    fn hide(&mut self);
}

/// Host that "loads" a scene over a fixed number of polls.
#[derive(Debug, Clone)]
pub struct SimulatedSceneHost {
    frames: u32,
}

impl SimulatedSceneHost {
    pub fn new(frames: u32) -> Self {
        Self { frames }
    }
}

struct SimulatedLoad {
    frames: u32,
    elapsed: u32,
}

impl SceneLoadOperation for SimulatedLoad {
    fn poll(&mut self) -> LoadPoll {
        self.elapsed += 1;
        if self.elapsed >= self.frames {
            LoadPoll::Done
        } else {
            LoadPoll::InProgress(self.elapsed as f32 / self.frames as f32)
        }
    }
}

impl SceneHost for SimulatedSceneHost {
    fn begin_load(&mut self, _scene: &str) -> Box<dyn SceneLoadOperation> {
        Box::new(SimulatedLoad {
            frames: self.frames,
            elapsed: 0,
        })
    }
}

/// Outcome of a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// The request was admitted and is now in flight.
    Started,
    /// The scene is already active and nothing is loading.
    AlreadyLoaded,
    /// Another load is in flight; this request was dropped.
    Rejected { in_flight: String },
    /// No scene host is installed.
    Unavailable,
}

struct InFlightLoad {
    scene: String,
    progress: f32,
    operation: Box<dyn SceneLoadOperation>,
}

pub struct SceneLoader {
    host: Option<Box<dyn SceneHost>>,
    loading_screen: Option<Box<dyn LoadingScreen>>,
    in_flight: Option<InFlightLoad>,
    active_scene: Option<String>,
}

impl SceneLoader {
    pub fn new(host: Option<Box<dyn SceneHost>>) -> Self {
        Self {
            host,
            loading_screen: None,
            in_flight: None,
            active_scene: None,
        }
    }

    pub fn set_host(&mut self, host: Option<Box<dyn SceneHost>>) {
        self.host = host;
    }

    pub fn set_loading_screen(&mut self, screen: Option<Box<dyn LoadingScreen>>) {
        self.loading_screen = screen;
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    pub fn loading_scene(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|load| load.scene.as_str())
    }

    /// Progress of the in-flight load, if any.
    pub fn progress(&self) -> Option<f32> {
        self.in_flight.as_ref().map(|load| load.progress)
    }

    pub fn load_scene_async(&mut self, scene: &str, bus: &EventBus) -> LoadRequest {
        if let Some(load) = &self.in_flight {
            warn!(
                "Scene load for '{scene}' rejected: '{}' is already loading",
                load.scene
            );
            return LoadRequest::Rejected {
                in_flight: load.scene.clone(),
            };
        }
        if self.active_scene.as_deref() == Some(scene) {
            debug!("Scene '{scene}' already loaded; skipping load");
            return LoadRequest::AlreadyLoaded;
        }
        let Some(host) = self.host.as_mut() else {
            warn!("No scene host installed; cannot load '{scene}'");
            return LoadRequest::Unavailable;
        };

        let operation = host.begin_load(scene);
        self.in_flight = Some(InFlightLoad {
            scene: scene.to_string(),
            progress: 0.0,
            operation,
        });
        info!("Loading scene '{scene}'");
        bus.publish(&Signal::LoadStarted {
            scene: scene.to_string(),
        });
        if let Some(screen) = self.loading_screen.as_mut() {
            screen.show(scene);
        }
        LoadRequest::Started
    }

    /// Advance the in-flight load by one tick.  No-op when idle.
    pub fn poll(&mut self, bus: &EventBus) {
        let Some(load) = self.in_flight.as_mut() else {
            return;
        };

        let progress = match load.operation.poll() {
            LoadPoll::InProgress(progress) => progress.clamp(0.0, 1.0),
            LoadPoll::Done => 1.0,
        };
        let done = progress >= 1.0;
        load.progress = progress;
        let scene = load.scene.clone();

        if let Some(screen) = self.loading_screen.as_mut() {
            screen.set_progress(progress);
        }
        debug!("Scene '{scene}' progress {:.0}%", progress * 100.0);
        bus.publish(&Signal::LoadProgress {
            scene: scene.clone(),
            progress,
        });

        if done {
            self.in_flight = None;
            self.active_scene = Some(scene.clone());
            if let Some(screen) = self.loading_screen.as_mut() {
                screen.hide();
            }
            info!("Scene '{scene}' loaded");
            bus.publish(&Signal::LoadCompleted { scene });
        }
    }
}
