use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::rc::Rc;

use bevy::log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BGM_VOLUME, DEFAULT_MASTER_VOLUME, DEFAULT_QUALITY_INDEX, DEFAULT_SFX_VOLUME,
    RECORD_VERSION,
};
use crate::error::{PersistenceError, PersistenceResult};

// ── Record layout ─────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenMode {
    Fullscreen,
    #[default]
    Borderless,
    Windowed,
}

/// Player-facing settings, nested inside [`PersistedRecord`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub resolution_index: u32,
    pub screen_mode: ScreenMode,
    pub vsync: bool,
    pub quality_index: u32,
    pub master_volume: f32,
    pub bgm_volume: f32,
    pub sfx_volume: f32,
    pub mute_all: bool,
    pub screen_shake: bool,
    pub show_damage_numbers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution_index: 0,
            screen_mode: ScreenMode::default(),
            vsync: true,
            quality_index: DEFAULT_QUALITY_INDEX,
            master_volume: DEFAULT_MASTER_VOLUME,
            bgm_volume: DEFAULT_BGM_VOLUME,
            sfx_volume: DEFAULT_SFX_VOLUME,
            mute_all: false,
            screen_shake: true,
            show_damage_numbers: true,
        }
    }
}

/// Durable progress-and-settings record.
///
/// `settings` is declared last so it serializes as a trailing TOML table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub version: u32,
    pub highest_floor_cleared: u32,
    pub story_chapter_unlocked: u32,
    pub settings: Settings,
}

impl Default for PersistedRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            highest_floor_cleared: 0,
            story_chapter_unlocked: 0,
            settings: Settings::default(),
        }
    }
}

pub fn encode_record(record: &PersistedRecord) -> PersistenceResult<String> {
    toml::to_string_pretty(record).map_err(|err| PersistenceError::Encode(err.to_string()))
}

/// Parse a stored blob, filling in keys written by older builds.
pub fn decode_record(contents: &str) -> PersistenceResult<PersistedRecord> {
    let mut value: toml::Value = toml::from_str(contents)
        .map_err(|err| PersistenceError::Decode(format!("invalid TOML: {err}")))?;

    let table = value
        .as_table_mut()
        .ok_or_else(|| PersistenceError::Decode("record root must be a table".to_string()))?;

    if !table.contains_key("version") {
        table.insert(
            "version".to_string(),
            toml::Value::Integer(i64::from(RECORD_VERSION)),
        );
    }

    let version = table
        .get("version")
        .and_then(toml::Value::as_integer)
        .ok_or_else(|| PersistenceError::Decode("version is not an integer".to_string()))?;
    if version != i64::from(RECORD_VERSION) {
        return Err(PersistenceError::Decode(format!(
            "unsupported record version {version} (expected {RECORD_VERSION})"
        )));
    }

    value
        .try_into::<PersistedRecord>()
        .map_err(|err| PersistenceError::Decode(err.to_string()))
}

// ── Backends ──────────────────────────────────────────────────────────────────

/// Durable storage for a single [`PersistedRecord`].
pub trait StorageBackend {
    /// `Ok(None)` means nothing has been stored yet.
    fn load(&mut self) -> PersistenceResult<Option<PersistedRecord>>;
    fn save(&mut self, record: &PersistedRecord) -> PersistenceResult<()>;
    fn describe(&self) -> String;
}

/// Pretty TOML file on local disk.
#[derive(Debug, Clone)]
pub struct TomlFileStorage {
    path: PathBuf,
}

impl TomlFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for TomlFileStorage {
    fn load(&mut self) -> PersistenceResult<Option<PersistedRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => decode_record(&contents).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&mut self, record: &PersistedRecord) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = encode_record(record)?;
        fs::write(&self.path, serialized).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[derive(Debug, Default)]
struct MemorySlot {
    blob: Option<String>,
    saves: u32,
}

/// In-process storage.  Clones share the same slot, so a test can keep one
/// handle while the facade owns another.
///
/// Records are stored encoded, so a round trip goes through the same codec as
/// the file backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Rc<RefCell<MemorySlot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: &PersistedRecord) -> PersistenceResult<Self> {
        let storage = Self::new();
        storage.slot.borrow_mut().blob = Some(encode_record(record)?);
        Ok(storage)
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u32 {
        self.slot.borrow().saves
    }

    pub fn stored(&self) -> Option<PersistedRecord> {
        let slot = self.slot.borrow();
        slot.blob.as_deref().and_then(|blob| decode_record(blob).ok())
    }

    /// Overwrite the raw blob (used to simulate corrupt storage).
    pub fn set_raw(&self, blob: impl Into<String>) {
        self.slot.borrow_mut().blob = Some(blob.into());
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&mut self) -> PersistenceResult<Option<PersistedRecord>> {
        let slot = self.slot.borrow();
        slot.blob.as_deref().map(decode_record).transpose()
    }

    fn save(&mut self, record: &PersistedRecord) -> PersistenceResult<()> {
        let blob = encode_record(record)?;
        let mut slot = self.slot.borrow_mut();
        slot.blob = Some(blob);
        slot.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Which backend the facade opens on `initialize`.
#[derive(Debug, Clone)]
pub enum StorageSelection {
    File(PathBuf),
    Memory(MemoryStorage),
}

impl StorageSelection {
    fn open(&self) -> Box<dyn StorageBackend> {
        match self {
            StorageSelection::File(path) => Box::new(TomlFileStorage::new(path.clone())),
            StorageSelection::Memory(storage) => Box::new(storage.clone()),
        }
    }
}

// ── Facade ────────────────────────────────────────────────────────────────────

/// Sole owner of the [`PersistedRecord`] and the only component that touches
/// durable storage.
pub struct PersistenceFacade {
    selection: StorageSelection,
    backend: Option<Box<dyn StorageBackend>>,
    record: PersistedRecord,
}

impl PersistenceFacade {
    pub fn new(selection: StorageSelection) -> Self {
        Self {
            selection,
            backend: None,
            record: PersistedRecord::default(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Open the selected backend and load the stored record.
    ///
    /// Missing data means first run.  Unreadable data is logged and replaced
    /// by defaults; boot never fails here.
    pub fn initialize(&mut self) {
        let mut backend = self.selection.open();
        self.record = match backend.load() {
            Ok(Some(record)) => {
                info!("Loaded progress record from {}", backend.describe());
                record
            }
            Ok(None) => {
                info!("No progress record in {}; starting fresh", backend.describe());
                PersistedRecord::default()
            }
            Err(err) => {
                warn!("Could not load progress record ({err}); using defaults");
                PersistedRecord::default()
            }
        };
        self.backend = Some(backend);
    }

    /// Write the in-memory record through to the backend.
    pub fn save(&mut self) -> PersistenceResult<()> {
        let Some(backend) = self.backend.as_mut() else {
            warn!("Persistence save requested before initialize; opening backend now");
            self.backend = Some(self.selection.open());
            return self.save();
        };
        backend.save(&self.record)?;
        info!("Saved progress record to {}", backend.describe());
        Ok(())
    }

    /// `save`, with failures logged instead of returned.
    pub fn checkpoint(&mut self, reason: &str) {
        if let Err(err) = self.save() {
            error!("Failed to save progress record at {reason}: {err}");
        }
    }

    pub fn record(&self) -> &PersistedRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut PersistedRecord {
        &mut self.record
    }

    /// Replace the settings sub-record and persist it (settings-apply checkpoint).
    pub fn apply_settings(&mut self, settings: Settings) {
        self.record.settings = settings;
        self.checkpoint("settings apply");
    }
}
