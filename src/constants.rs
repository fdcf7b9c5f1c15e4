//! Compiled defaults.  [`crate::config::FlowConfig::default`] reads from here;
//! `assets/flow.toml` may override any of the runtime-tunable values.

// ── Scenes ────────────────────────────────────────────────────────────────────

pub const TITLE_SCENE: &str = "title";
pub const GAMEPLAY_SCENE: &str = "arena";
pub const RESULT_SCENE: &str = "result";

/// Frames the simulated scene host takes to finish one load.
pub const LOAD_FRAMES: u32 = 30;

// ── Persistence ───────────────────────────────────────────────────────────────

pub const SAVE_PATH: &str = "saves/progress.toml";
pub const RECORD_VERSION: u32 = 1;

pub const DEFAULT_MASTER_VOLUME: f32 = 1.0;
pub const DEFAULT_BGM_VOLUME: f32 = 0.8;
pub const DEFAULT_SFX_VOLUME: f32 = 0.8;
pub const DEFAULT_QUALITY_INDEX: u32 = 2;

// ── Runs ──────────────────────────────────────────────────────────────────────

pub const START_FLOOR: u32 = 1;
pub const STORY_OBJECTIVE: &str = "Reach the lighthouse";
pub const DEFAULT_ABILITIES: [&str; 2] = ["dash", "arc_slash"];

/// Normal (unscaled) virtual time.
pub const NORMAL_TIME_SCALE: f32 = 1.0;

// ── Demo combat source (binary only) ──────────────────────────────────────────

pub const STARTING_ENEMIES: u32 = 6;
pub const ENEMY_DEATH_CHANCE_PER_SECOND: f64 = 0.9;
pub const BOSS_SPAWN_CHANCE_PER_SECOND: f64 = 0.15;
pub const KILL_REWARD: i64 = 5;
