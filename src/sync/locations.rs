use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::io::vault::atomic_write;

/// A specific line in a specific document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    pub path: String,
    pub line: usize,
}

/// Persisted form: one record per known location.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocationEntry {
    path: String,
    line: usize,
    task_id: String,
}

/// The binding between tagged lines and stable task ids.
///
/// Created the first time a tagged line is observed at a location and
/// kept across scans, so editing a line in place preserves its task
/// identity. Entries for a file are purged when a later scan no longer
/// observes a tagged line at that location.
#[derive(Debug, Default)]
pub struct LocationMap {
    map: HashMap<LocationKey, String>,
}

impl LocationMap {
    pub fn new() -> Self {
        LocationMap::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, path: &str, line: usize) -> Option<&str> {
        self.map
            .get(&LocationKey {
                path: path.to_string(),
                line,
            })
            .map(String::as_str)
    }

    /// Return the task id bound to this location, minting a fresh one on
    /// first observation.
    pub fn resolve_or_create(&mut self, path: &str, line: usize) -> String {
        self.map
            .entry(LocationKey {
                path: path.to_string(),
                line,
            })
            .or_insert_with(|| format!("task-{}", uuid::Uuid::new_v4()))
            .clone()
    }

    /// Drop every entry for `path` whose line was not observed in the
    /// scan pass that just finished.
    pub fn retain_observed(&mut self, path: &str, observed: &HashSet<usize>) {
        self.map
            .retain(|key, _| key.path != path || observed.contains(&key.line));
    }

    /// Load from disk. Missing or malformed files yield an empty map.
    pub fn load(path: &Path) -> LocationMap {
        let Ok(content) = std::fs::read_to_string(path) else {
            return LocationMap::new();
        };
        let Ok(entries) = serde_json::from_str::<Vec<LocationEntry>>(&content) else {
            return LocationMap::new();
        };
        let map = entries
            .into_iter()
            .map(|e| {
                (
                    LocationKey {
                        path: e.path,
                        line: e.line,
                    },
                    e.task_id,
                )
            })
            .collect();
        LocationMap { map }
    }

    /// Persist as JSON, atomically, in stable order.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut entries: Vec<LocationEntry> = self
            .map
            .iter()
            .map(|(key, task_id)| LocationEntry {
                path: key.path.clone(),
                line: key.line,
                task_id: task_id.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
        let content = serde_json::to_string_pretty(&entries)?;
        atomic_write(path, content.as_bytes())
    }
}
