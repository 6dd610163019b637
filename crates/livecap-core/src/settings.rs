use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::captions::{DEFAULT_CAPTION_TIMEOUT, DEFAULT_MAX_CAPTIONS_ON_SCREEN};
use crate::errors::LivecapError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub captions_enabled: bool,
    #[serde(default = "default_max_captions")]
    pub max_captions_on_screen: usize,
    #[serde(default = "default_timeout_ms")]
    pub caption_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_captions() -> usize {
    DEFAULT_MAX_CAPTIONS_ON_SCREEN
}

fn default_timeout_ms() -> u64 {
    DEFAULT_CAPTION_TIMEOUT.as_millis() as u64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            captions_enabled: true,
            max_captions_on_screen: default_max_captions(),
            caption_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Settings {
    pub fn caption_timeout(&self) -> Duration {
        Duration::from_millis(self.caption_timeout_ms)
    }
}

/// Settings persisted as `settings.json` in a data directory.
pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let file_path = data_dir.as_ref().join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.lock().clone()
    }

    pub fn set_captions_enabled(&self, enabled: bool) -> Result<(), LivecapError> {
        self.lock().captions_enabled = enabled;
        self.save()
    }

    pub fn set_max_captions_on_screen(&self, max: usize) -> Result<(), LivecapError> {
        if max == 0 {
            return Err(LivecapError::Settings(
                "max_captions_on_screen must be at least 1".into(),
            ));
        }
        self.lock().max_captions_on_screen = max;
        self.save()
    }

    pub fn set_caption_timeout_ms(&self, timeout_ms: u64) -> Result<(), LivecapError> {
        self.lock().caption_timeout_ms = timeout_ms;
        self.save()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self) -> Result<(), LivecapError> {
        let settings = self.get();
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LivecapError::Settings(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(&settings)
            .map_err(|e| LivecapError::Settings(e.to_string()))?;
        std::fs::write(&self.file_path, json).map_err(|e| {
            LivecapError::Settings(format!("write {}: {e}", self.file_path.display()))
        })
    }

    fn load(path: &Path) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable settings {}: {e}", path.display());
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }
}
