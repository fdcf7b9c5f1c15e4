//! Game modes and the pause payloads they produce.

use std::time::Duration;

use bevy::log::info;
use serde::Deserialize;

use crate::config::FlowConfig;
use crate::persistence::PersistedRecord;
use crate::phase::RunResult;
use crate::ui_stack::OverlayKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    #[default]
    Roguelike,
    Story,
}

impl ModeKind {
    pub fn label(self) -> &'static str {
        match self {
            ModeKind::Roguelike => "roguelike",
            ModeKind::Story => "story",
        }
    }
}

// ── Pause context ─────────────────────────────────────────────────────────────

/// Fields every pause context carries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PauseBase {
    pub equipped_abilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoguelikePause {
    pub base: PauseBase,
    pub floor: u32,
    pub elapsed: Duration,
    pub currency_earned: i64,
    pub upgrades: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryPause {
    pub base: PauseBase,
    pub objective: String,
}

/// Payload handed to the pause overlay.  One variant per game mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseContext {
    Roguelike(RoguelikePause),
    Story(StoryPause),
}

impl PauseContext {
    pub fn mode(&self) -> ModeKind {
        match self {
            PauseContext::Roguelike(_) => ModeKind::Roguelike,
            PauseContext::Story(_) => ModeKind::Story,
        }
    }

    pub fn base(&self) -> &PauseBase {
        match self {
            PauseContext::Roguelike(run) => &run.base,
            PauseContext::Story(story) => &story.base,
        }
    }
}

/// Live run figures the gameplay phase hands to the mode when pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub elapsed: Duration,
    pub currency_earned: i64,
}

// ── Modes ─────────────────────────────────────────────────────────────────────

pub trait GameMode {
    fn kind(&self) -> ModeKind;

    /// Prepare a fresh run once the gameplay scene is loaded.
    fn initialize_run(&mut self, record: &PersistedRecord);

    fn pause_context(&self, snapshot: &RunSnapshot) -> PauseContext;

    fn pause_overlay(&self) -> OverlayKey;

    /// Fold a finished run into the persisted progress.
    fn apply_outcome(&self, result: &RunResult, record: &mut PersistedRecord);
}

/// Floor-by-floor runs; progress is the highest floor cleared.
#[derive(Debug, Clone)]
pub struct RoguelikeMode {
    start_floor: u32,
    floor: u32,
    abilities: Vec<String>,
    upgrades: Vec<String>,
}

impl RoguelikeMode {
    pub fn new(start_floor: u32, abilities: Vec<String>) -> Self {
        Self {
            start_floor,
            floor: start_floor,
            abilities,
            upgrades: Vec::new(),
        }
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    pub fn acquire_upgrade(&mut self, upgrade: impl Into<String>) {
        self.upgrades.push(upgrade.into());
    }
}

impl GameMode for RoguelikeMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Roguelike
    }

    fn initialize_run(&mut self, record: &PersistedRecord) {
        self.floor = self.start_floor.max(record.highest_floor_cleared.saturating_add(1));
        self.upgrades.clear();
        info!("Roguelike run starting on floor {}", self.floor);
    }

    fn pause_context(&self, snapshot: &RunSnapshot) -> PauseContext {
        PauseContext::Roguelike(RoguelikePause {
            base: PauseBase {
                equipped_abilities: self.abilities.clone(),
            },
            floor: self.floor,
            elapsed: snapshot.elapsed,
            currency_earned: snapshot.currency_earned,
            upgrades: self.upgrades.clone(),
        })
    }

    fn pause_overlay(&self) -> OverlayKey {
        OverlayKey::ROGUELIKE_PAUSE
    }

    fn apply_outcome(&self, result: &RunResult, record: &mut PersistedRecord) {
        if result.victory {
            record.highest_floor_cleared = record.highest_floor_cleared.max(self.floor);
        }
    }
}

/// Chapter-based runs; progress is the highest chapter unlocked.
#[derive(Debug, Clone)]
pub struct StoryMode {
    chapter: u32,
    objective: String,
    abilities: Vec<String>,
}

impl StoryMode {
    pub fn new(objective: impl Into<String>, abilities: Vec<String>) -> Self {
        Self {
            chapter: 1,
            objective: objective.into(),
            abilities,
        }
    }
}

impl GameMode for StoryMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Story
    }

    fn initialize_run(&mut self, record: &PersistedRecord) {
        self.chapter = record.story_chapter_unlocked.max(1);
        info!("Story run starting in chapter {}", self.chapter);
    }

    fn pause_context(&self, _snapshot: &RunSnapshot) -> PauseContext {
        PauseContext::Story(StoryPause {
            base: PauseBase {
                equipped_abilities: self.abilities.clone(),
            },
            objective: self.objective.clone(),
        })
    }

    fn pause_overlay(&self) -> OverlayKey {
        OverlayKey::STORY_PAUSE
    }

    fn apply_outcome(&self, result: &RunResult, record: &mut PersistedRecord) {
        if result.victory {
            record.story_chapter_unlocked = record
                .story_chapter_unlocked
                .max(self.chapter.saturating_add(1));
        }
    }
}

pub fn mode_from_config(config: &FlowConfig) -> Box<dyn GameMode> {
    match config.mode {
        ModeKind::Roguelike => Box::new(RoguelikeMode::new(
            config.start_floor,
            config.abilities.clone(),
        )),
        ModeKind::Story => Box::new(StoryMode::new(
            config.story_objective.clone(),
            config.abilities.clone(),
        )),
    }
}
