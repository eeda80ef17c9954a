use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Configuration from config.toml.
///
/// This is the read-only view handed to the scanner and coordinator at
/// construction time; only the `sync` table is mutated by the core (and
/// persisted back through `save_settings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base tag that marks a checklist line as a task (without `#`).
    #[serde(default = "default_tag_pattern")]
    pub tag_pattern: String,
    /// Folders eligible for daily-note scanning. Empty = scan everywhere.
    #[serde(default)]
    pub scan_folders: Vec<String>,
    /// Project receiving scanned tasks that carry no routing tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
    /// Folder under which per-project task notes are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_base_path: Option<String>,
    /// Per-project last full sync, epoch milliseconds.
    #[serde(default)]
    pub sync: BTreeMap<String, i64>,
}

fn default_tag_pattern() -> String {
    "planner".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tag_pattern: default_tag_pattern(),
            scan_folders: Vec::new(),
            default_project: None,
            projects_base_path: None,
            sync: BTreeMap::new(),
        }
    }
}
