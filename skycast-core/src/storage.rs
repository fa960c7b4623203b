//! Flat key-value persistence, one JSON file per key.
//!
//! This is the dashboard's local-storage analog: small values, synchronous
//! access, no schema beyond what each caller serializes.

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::Config;
use crate::model::{Location, Theme};

/// Storage keys used by the dashboard.
pub mod keys {
    pub const SEARCH_HISTORY: &str = "search_history";
    pub const LAST_SELECTED_LOCATION: &str = "last_selected_location";
    pub const THEME: &str = "theme";
}

#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Open storage rooted at the platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(Config::data_dir()?)
    }

    /// Open storage rooted at an explicit directory, creating it as needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(Storage { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read and deserialize a value. `Ok(None)` when the key was never set.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    /// Read a key as untyped JSON. Used where the on-disk shape may predate
    /// the current schema.
    pub fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get(key)
    }

    /// Serialize and persist a value, replacing any previous one.
    ///
    /// Writes to a temp file and renames it over the target so readers never
    /// observe a half-written value.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));

        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize value for key '{key}'"))?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }

    /// Delete a key. Missing keys are not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    /// Persisted theme preference, defaulting to light.
    pub fn theme(&self) -> Theme {
        match self.get::<Theme>(keys::THEME) {
            Ok(Some(theme)) => theme,
            Ok(None) => Theme::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable theme preference: {e:#}");
                Theme::default()
            }
        }
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set(keys::THEME, &theme)
    }

    /// The location last selected by the user, if one was recorded.
    pub fn last_selected_location(&self) -> Option<Location> {
        match self.get::<Location>(keys::LAST_SELECTED_LOCATION) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Ignoring unreadable last-selected location: {e:#}");
                None
            }
        }
    }

    pub fn set_last_selected_location(&self, location: &Location) -> Result<()> {
        self.set(keys::LAST_SELECTED_LOCATION, location)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
