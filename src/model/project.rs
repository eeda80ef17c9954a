use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::task::Task;

/// A configurable option entry: a status, priority, or tag definition.
/// Projects own mutable lists of these instead of hardcoded enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl OptionItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        OptionItem {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// A board column grouping tasks, independent of status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub name: String,
}

/// A named collection of tasks with its own option sets, board layout,
/// and an optional override for where its markdown lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default = "default_statuses")]
    pub statuses: Vec<OptionItem>,
    #[serde(default = "default_priorities")]
    pub priorities: Vec<OptionItem>,
    #[serde(default)]
    pub tags: Vec<OptionItem>,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    /// Per-project override for the projects base path.
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,
}

fn default_statuses() -> Vec<OptionItem> {
    vec![
        OptionItem::new("not-started", "Not Started", "#9e9e9e"),
        OptionItem::new("in-progress", "In Progress", "#2196f3"),
        OptionItem::new("completed", "Completed", "#4caf50"),
    ]
}

fn default_priorities() -> Vec<OptionItem> {
    vec![
        OptionItem::new("critical", "Critical", "#d32f2f"),
        OptionItem::new("high", "High", "#f57c00"),
        OptionItem::new("medium", "Medium", "#fbc02d"),
        OptionItem::new("low", "Low", "#7cb342"),
    ]
}

impl Project {
    /// Create a project with the default status and priority sets.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Project {
            id: id.into(),
            name: name.into(),
            statuses: default_statuses(),
            priorities: default_priorities(),
            tags: Vec::new(),
            buckets: Vec::new(),
            base_path: None,
            tasks: IndexMap::new(),
        }
    }

    /// Name of the default (first) status option.
    pub fn default_status(&self) -> &str {
        self.statuses.first().map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Look up a tag definition by name, case-insensitively.
    pub fn tag_by_name(&self, name: &str) -> Option<&OptionItem> {
        self.tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Leaf tasks only: tasks that no other task names as parent.
    /// Parents are excluded from board and scan-import views.
    pub fn leaf_tasks(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| !self.tasks.values().any(|c| c.parent_id.as_deref() == Some(t.id.as_str())))
            .collect()
    }
}
