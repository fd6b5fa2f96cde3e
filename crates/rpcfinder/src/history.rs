//! Recently selected methods.
//!
//! History is a most-recent-first list of `(class, method)` pairs. It is kept
//! by name rather than by record so that it survives rescans; entries whose
//! method no longer exists are skipped when the list is matched against the
//! live index, but they stay stored in case the method comes back.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{IndexError, MethodRecord, Result};

/// Location of the JSON history file, relative to the workspace root.
pub const HISTORY_FILE: &str = ".rpcfinder/history.json";

/// One remembered selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub method_name: String,
    pub class_name: String,
}

impl HistoryEntry {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            class_name: class_name.into(),
        }
    }

    fn key(&self) -> (&str, &str) {
        (&self.class_name, &self.method_name)
    }
}

impl From<&MethodRecord> for HistoryEntry {
    fn from(record: &MethodRecord) -> Self {
        Self::new(record.class_name.clone(), record.method_name.clone())
    }
}

/// Where history lives between sessions.
pub trait HistoryStore: Send + Sync {
    /// Stored entries, most recent first. A store that was never written
    /// returns an empty list.
    fn load(&self) -> Result<Vec<HistoryEntry>>;

    fn save(&self, entries: &[HistoryEntry]) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.to_vec();
        Ok(())
    }
}

/// History persisted as a JSON array of entries.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`HISTORY_FILE`] under `root`.
    pub fn for_root(root: &Path) -> Self {
        Self::new(root.join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| IndexError::HistoryError(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(|e| IndexError::HistoryError(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// History split against the live index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    /// Live records for history entries, most recent first
    pub recent: Vec<MethodRecord>,
    /// Every other live record, ordered by class then method
    pub remaining: Vec<MethodRecord>,
}

/// Capped, deduplicated history backed by a [`HistoryStore`].
pub struct MethodHistory<S: HistoryStore> {
    store: S,
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl<S: HistoryStore> std::fmt::Debug for MethodHistory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodHistory")
            .field("entries", &self.entries.len())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<S: HistoryStore> MethodHistory<S> {
    /// Load history from `store`, keeping at most `limit` entries.
    pub fn open(store: S, limit: usize) -> Result<Self> {
        let mut entries = store.load()?;

        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.clone()));
        entries.truncate(limit);

        Ok(Self {
            store,
            entries,
            limit,
        })
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Move `entry` to the front without persisting.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| *e != entry);
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
    }

    /// Remember a selection and persist the updated list.
    pub fn select(&mut self, record: &MethodRecord) -> Result<()> {
        self.record(HistoryEntry::from(record));
        self.store.save(&self.entries)?;
        tracing::debug!("Recorded {} in history ({} entries)", record, self.entries.len());
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.store.save(&self.entries)
    }

    /// Split `live` into history hits and the rest.
    ///
    /// An entry resolves to the record with the lowest offset among those with
    /// its class and method name. Entries that resolve to nothing are dropped
    /// from the result, and every record sharing a resolved key is left out of
    /// `remaining`.
    pub fn reconcile(&self, live: &[MethodRecord]) -> Reconciled {
        let mut by_key: HashMap<(&str, &str), &MethodRecord> = HashMap::new();
        for record in live {
            by_key
                .entry(record.history_key())
                .and_modify(|best| {
                    if record.text_offset < best.text_offset {
                        *best = record;
                    }
                })
                .or_insert(record);
        }

        let recent: Vec<MethodRecord> = self
            .entries
            .iter()
            .filter_map(|e| by_key.get(&e.key()).map(|r| (*r).clone()))
            .collect();

        let taken: HashSet<(&str, &str)> = recent.iter().map(|r| r.history_key()).collect();
        let mut remaining: Vec<MethodRecord> = live
            .iter()
            .filter(|r| !taken.contains(&r.history_key()))
            .cloned()
            .collect();
        remaining.sort_by(|a, b| {
            a.class_name
                .cmp(&b.class_name)
                .then_with(|| a.method_name.cmp(&b.method_name))
                .then_with(|| a.text_offset.cmp(&b.text_offset))
        });

        Reconciled { recent, remaining }
    }
}
