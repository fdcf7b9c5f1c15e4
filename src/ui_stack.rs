//! Modal overlay stack.
//!
//! Overlays are pushed in LIFO order under a dedicated always-on-top
//! [`PresentationSurface`].  Only the top entry is interactive; everything
//! below it stays present but input-disabled until it becomes the top again.

use std::collections::HashMap;
use std::fmt;

use bevy::log::debug;

use crate::error::OverlayError;
use crate::mode::{ModeKind, PauseContext};

/// Root all overlays are parented to.  Sort orders handed to overlays start at
/// `base_sort_order` and grow with stack depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationSurface {
    pub name: &'static str,
    pub base_sort_order: i32,
}

impl Default for PresentationSurface {
    fn default() -> Self {
        Self {
            name: "overlay-root",
            base_sort_order: 1_000,
        }
    }
}

/// A modal UI element that can live on the [`UiStack`].
pub trait Overlay {
    fn name(&self) -> &str;

    /// Populate the view from a pause context.  Overlays that take no
    /// context accept anything.
    fn initialize(&mut self, _context: &PauseContext) -> Result<(), OverlayError> {
        Ok(())
    }

    fn attach(&mut self, surface: &PresentationSurface, sort_order: i32);
    fn set_interactive(&mut self, interactive: bool);
    fn destroy(&mut self);

    /// Text rows the host renders for this overlay.
    fn lines(&self) -> Vec<String> {
        Vec::new()
    }
}

pub struct UiStackEntry {
    overlay: Box<dyn Overlay>,
    interactive: bool,
}

impl UiStackEntry {
    pub fn overlay(&self) -> &dyn Overlay {
        self.overlay.as_ref()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
        self.overlay.set_interactive(interactive);
    }
}

impl fmt::Debug for UiStackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiStackEntry")
            .field("overlay", &self.overlay.name())
            .field("interactive", &self.interactive)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct UiStack {
    surface: PresentationSurface,
    entries: Vec<UiStackEntry>,
}

impl UiStack {
    pub fn push(&mut self, mut overlay: Box<dyn Overlay>) {
        if let Some(top) = self.entries.last_mut() {
            top.set_interactive(false);
        }
        let sort_order = self.surface.base_sort_order + self.entries.len() as i32;
        overlay.attach(&self.surface, sort_order);
        debug!("UI push '{}' at depth {}", overlay.name(), self.entries.len());
        let mut entry = UiStackEntry {
            overlay,
            interactive: false,
        };
        entry.set_interactive(true);
        self.entries.push(entry);
    }

    /// Destroy the top overlay and hand interactivity to the one below it.
    ///
    /// Returns `false` (and does nothing) when the stack is empty.
    pub fn pop(&mut self) -> bool {
        let Some(mut entry) = self.entries.pop() else {
            return false;
        };
        debug!("UI pop '{}'", entry.overlay.name());
        entry.set_interactive(false);
        entry.overlay.destroy();
        if let Some(top) = self.entries.last_mut() {
            top.set_interactive(true);
        }
        true
    }

    pub fn close_all(&mut self) {
        while self.pop() {}
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self) -> Option<&UiStackEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[UiStackEntry] {
        &self.entries
    }
}

// ── Overlay catalog ───────────────────────────────────────────────────────────

/// Identifier of an overlay prefab in the [`OverlayCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayKey(pub &'static str);

impl OverlayKey {
    pub const ROGUELIKE_PAUSE: OverlayKey = OverlayKey("pause.roguelike");
    pub const STORY_PAUSE: OverlayKey = OverlayKey("pause.story");
}

type OverlayFactory = Box<dyn Fn() -> Box<dyn Overlay>>;

/// Prefab registry; overlays are instantiated fresh on every lookup.
#[derive(Default)]
pub struct OverlayCatalog {
    prefabs: HashMap<OverlayKey, OverlayFactory>,
}

impl OverlayCatalog {
    /// Catalog with the built-in pause menus registered.
    pub fn with_pause_menus() -> Self {
        let mut catalog = Self::default();
        catalog.register(OverlayKey::ROGUELIKE_PAUSE, || {
            Box::new(PauseMenuOverlay::new(ModeKind::Roguelike))
        });
        catalog.register(OverlayKey::STORY_PAUSE, || {
            Box::new(PauseMenuOverlay::new(ModeKind::Story))
        });
        catalog
    }

    pub fn register(&mut self, key: OverlayKey, factory: impl Fn() -> Box<dyn Overlay> + 'static) {
        self.prefabs.insert(key, Box::new(factory));
    }

    pub fn unregister(&mut self, key: OverlayKey) {
        self.prefabs.remove(&key);
    }

    pub fn instantiate(&self, key: OverlayKey) -> Option<Box<dyn Overlay>> {
        self.prefabs.get(&key).map(|factory| factory())
    }
}

// ── Pause menus ───────────────────────────────────────────────────────────────

/// Pause menu that renders the fields of one [`PauseContext`] variant.
#[derive(Debug, Clone)]
pub struct PauseMenuOverlay {
    accepts: ModeKind,
    lines: Vec<String>,
    interactive: bool,
    sort_order: Option<i32>,
}

impl PauseMenuOverlay {
    pub fn new(accepts: ModeKind) -> Self {
        Self {
            accepts,
            lines: Vec::new(),
            interactive: false,
            sort_order: None,
        }
    }

    pub fn sort_order(&self) -> Option<i32> {
        self.sort_order
    }
}

fn format_clock(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

impl Overlay for PauseMenuOverlay {
    fn name(&self) -> &str {
        match self.accepts {
            ModeKind::Roguelike => "roguelike pause menu",
            ModeKind::Story => "story pause menu",
        }
    }

    fn initialize(&mut self, context: &PauseContext) -> Result<(), OverlayError> {
        let mut lines = vec!["PAUSED".to_string()];
        match (self.accepts, context) {
            (ModeKind::Roguelike, PauseContext::Roguelike(run)) => {
                lines.push(format!("Floor {}", run.floor));
                lines.push(format!("Time {}", format_clock(run.elapsed)));
                lines.push(format!("Currency {:+}", run.currency_earned));
                if !run.upgrades.is_empty() {
                    lines.push(format!("Upgrades: {}", run.upgrades.join(", ")));
                }
            }
            (ModeKind::Story, PauseContext::Story(story)) => {
                lines.push(format!("Objective: {}", story.objective));
            }
            (expected, other) => {
                return Err(OverlayError::ContextMismatch {
                    expected,
                    found: other.mode(),
                });
            }
        }
        let abilities = &context.base().equipped_abilities;
        if !abilities.is_empty() {
            lines.push(format!("Abilities: {}", abilities.join(", ")));
        }
        self.lines = lines;
        Ok(())
    }

    fn attach(&mut self, _surface: &PresentationSurface, sort_order: i32) {
        self.sort_order = Some(sort_order);
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    fn destroy(&mut self) {
        self.lines.clear();
        self.sort_order = None;
    }

    fn lines(&self) -> Vec<String> {
        self.lines.clone()
    }
}
