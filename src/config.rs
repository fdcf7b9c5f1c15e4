//! Runtime configuration loaded from `assets/flow.toml`.
//!
//! [`FlowConfig`] mirrors the tunable values in [`crate::constants`].  Missing
//! keys fall back to the compiled defaults, so a minimal TOML can override
//! just the values you care about.
//!
//! Keep `src/constants.rs` in sync: it remains the authoritative default source
//! used by `FlowConfig::default()`.

use std::path::{Path, PathBuf};

use bevy::log::{info, warn};
use serde::Deserialize;

use crate::constants::*;
use crate::mode::ModeKind;
use crate::persistence::{MemoryStorage, StorageSelection};

pub const CONFIG_PATH: &str = "assets/flow.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    // ── Scenes ────────────────────────────────────────────────────────────────
    pub title_scene: String,
    pub gameplay_scene: String,
    pub result_scene: String,
    pub load_frames: u32,

    // ── Persistence ───────────────────────────────────────────────────────────
    pub storage: StorageKind,
    pub save_path: PathBuf,

    // ── Runs ──────────────────────────────────────────────────────────────────
    pub mode: ModeKind,
    pub start_floor: u32,
    pub story_objective: String,
    pub abilities: Vec<String>,

    // ── Demo combat source ────────────────────────────────────────────────────
    pub starting_enemies: u32,
    pub death_chance_per_second: f64,
    pub boss_chance_per_second: f64,
    pub kill_reward: i64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            title_scene: TITLE_SCENE.to_string(),
            gameplay_scene: GAMEPLAY_SCENE.to_string(),
            result_scene: RESULT_SCENE.to_string(),
            load_frames: LOAD_FRAMES,
            storage: StorageKind::default(),
            save_path: PathBuf::from(SAVE_PATH),
            mode: ModeKind::default(),
            start_floor: START_FLOOR,
            story_objective: STORY_OBJECTIVE.to_string(),
            abilities: DEFAULT_ABILITIES.iter().map(|a| a.to_string()).collect(),
            starting_enemies: STARTING_ENEMIES,
            death_chance_per_second: ENEMY_DEATH_CHANCE_PER_SECOND,
            boss_chance_per_second: BOSS_SPAWN_CHANCE_PER_SECOND,
            kill_reward: KILL_REWARD,
        }
    }
}

impl FlowConfig {
    pub fn storage_selection(&self) -> StorageSelection {
        match self.storage {
            StorageKind::File => StorageSelection::File(self.save_path.clone()),
            StorageKind::Memory => StorageSelection::Memory(MemoryStorage::new()),
        }
    }
}

/// Read `path` and overlay its values on the compiled defaults.
///
/// A missing file is not an error.  Parse errors are logged and the defaults
/// are used instead.
pub fn load_flow_config(path: impl AsRef<Path>) -> FlowConfig {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<FlowConfig>(&contents) {
            Ok(loaded) => {
                info!("Loaded flow config from {}", path.display());
                loaded
            }
            Err(e) => {
                warn!("Failed to parse {}: {e}; using defaults", path.display());
                FlowConfig::default()
            }
        },
        Err(_) => {
            info!("No {} found; using compiled defaults", path.display());
            FlowConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: FlowConfig = toml::from_str(
            r#"
            mode = "story"
            load_frames = 3
            storage = "memory"
            "#,
        )
        .expect("parse");

        assert_eq!(config.mode, ModeKind::Story);
        assert_eq!(config.load_frames, 3);
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.title_scene, TITLE_SCENE);
        assert_eq!(config.save_path, PathBuf::from(SAVE_PATH));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_flow_config("definitely/not/here.toml");
        assert_eq!(config, FlowConfig::default());
    }

    #[test]
    fn memory_storage_selection_is_fresh() {
        let config = FlowConfig {
            storage: StorageKind::Memory,
            ..FlowConfig::default()
        };
        assert!(matches!(
            config.storage_selection(),
            StorageSelection::Memory(_)
        ));
    }
}
