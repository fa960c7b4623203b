//! Recent-search history: a bounded, deduplicated, most-recent-first list of
//! locations persisted through [`Storage`].

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::Location;
use crate::storage::{Storage, keys};

/// Maximum number of entries kept; older ones are evicted silently.
pub const HISTORY_LIMIT: usize = 6;

/// Two coordinate pairs within this tolerance on both axes (≈1 km at the
/// equator) are the same place. Absorbs provider jitter between lookups.
pub const COORD_TOLERANCE: f64 = 0.01;

const SCHEMA_VERSION: u32 = 2;

/// On-disk shape of the history file.
///
/// Version 1 data (a bare array of display-name strings, or an unversioned
/// array of location objects) is migrated to this shape the
/// first time it is read.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    entries: Vec<Location>,
}

#[derive(Debug, Clone)]
pub struct SearchHistory {
    storage: Storage,
}

impl SearchHistory {
    pub fn new(storage: Storage) -> Self {
        SearchHistory { storage }
    }

    /// The current history, most recent first.
    ///
    /// Unreadable files are treated as empty rather than failing the caller;
    /// history is a convenience, not a source of truth.
    pub fn get(&self) -> Vec<Location> {
        match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Ignoring unreadable search history: {e:#}");
                Vec::new()
            }
        }
    }

    /// Prepend an entry, drop its duplicates, truncate to the bound, persist,
    /// and return the new list. Accepts a full `Location` or a bare search
    /// string (normalized into a minimal entry).
    pub fn add(&self, entry: impl Into<Location>) -> Result<Vec<Location>> {
        let entry = entry.into();
        let mut entries = self.get();

        entries.retain(|existing| !is_duplicate(existing, &entry));
        entries.insert(0, entry);
        entries.truncate(HISTORY_LIMIT);

        self.persist(&entries)?;
        Ok(entries)
    }

    /// Remove entries matching the given name. Matching is by lowercased
    /// search key only, never coordinate proximity, so removing "Springfield"
    /// cannot take a nearby different location with it. Removing an absent
    /// entry returns the list unchanged.
    pub fn remove(&self, name: &str) -> Result<Vec<Location>> {
        let target = name.to_lowercase();
        let mut entries = self.get();
        let before = entries.len();

        entries.retain(|existing| existing.search_key() != target);

        if entries.len() != before {
            self.persist(&entries)?;
        }
        Ok(entries)
    }

    /// Drop the whole history.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(keys::SEARCH_HISTORY)
    }

    fn load(&self) -> Result<Vec<Location>> {
        let Some(raw) = self.storage.get_raw(keys::SEARCH_HISTORY)? else {
            return Ok(Vec::new());
        };

        // Current schema: {"version": 2, "entries": [...]}.
        if raw.is_object() {
            let file: HistoryFile = serde_json::from_value(raw)?;
            return Ok(file.entries);
        }

        // Version 1 wrote a bare JSON array: of display-name strings in the
        // oldest builds, of location objects later. Migrate once and rewrite.
        let entries = migrate_v1(raw)?;
        if let Err(e) = self.persist(&entries) {
            tracing::warn!("Migrated legacy search history but could not rewrite it: {e:#}");
        } else {
            tracing::info!("Migrated legacy search history ({} entries)", entries.len());
        }
        Ok(entries)
    }

    fn persist(&self, entries: &[Location]) -> Result<()> {
        let file = HistoryFile { version: SCHEMA_VERSION, entries: entries.to_vec() };
        self.storage.set(keys::SEARCH_HISTORY, &file)
    }
}

fn migrate_v1(raw: serde_json::Value) -> Result<Vec<Location>> {
    let items = raw
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("search history is neither an object nor an array"))?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let entry = match item.as_str() {
            Some(name) => Location::from(name),
            None => serde_json::from_value(item.clone())?,
        };
        entries.push(entry);
    }
    entries.truncate(HISTORY_LIMIT);
    Ok(entries)
}

/// Layered equality used when adding: coordinates decide when both entries
/// have them, otherwise lowercased search names, otherwise exact display
/// names.
fn is_duplicate(existing: &Location, incoming: &Location) -> bool {
    if let (Some((alat, alon)), Some((blat, blon))) = (existing.coords(), incoming.coords()) {
        return (alat - blat).abs() < COORD_TOLERANCE && (alon - blon).abs() < COORD_TOLERANCE;
    }

    if let (Some(a), Some(b)) = (&existing.search_name, &incoming.search_name) {
        return a.to_lowercase() == b.to_lowercase();
    }

    existing.display_name.is_some() && existing.display_name == incoming.display_name
}
