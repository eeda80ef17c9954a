use serde::{Deserialize, Serialize};

/// Dependency kind between a task and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepKind {
    /// Finish-to-start
    FS,
    /// Start-to-start
    SS,
    /// Finish-to-finish
    FF,
    /// Start-to-finish
    SF,
}

impl DepKind {
    /// The token used in the metadata header (`FS:task-id`).
    pub fn token(self) -> &'static str {
        match self {
            DepKind::FS => "FS",
            DepKind::SS => "SS",
            DepKind::FF => "FF",
            DepKind::SF => "SF",
        }
    }

    /// Parse a header token into a dependency kind.
    pub fn from_token(s: &str) -> Option<DepKind> {
        match s {
            "FS" => Some(DepKind::FS),
            "SS" => Some(DepKind::SS),
            "FF" => Some(DepKind::FF),
            "SF" => Some(DepKind::SF),
            _ => None,
        }
    }
}

/// A scheduling dependency on another task in the same project.
/// The predecessor may be dangling (deleted later); dangling entries are
/// kept and rendered degraded, never auto-removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub kind: DepKind,
    pub predecessor_id: String,
}

impl Dependency {
    pub fn new(kind: DepKind, predecessor_id: impl Into<String>) -> Self {
        Dependency {
            kind,
            predecessor_id: predecessor_id.into(),
        }
    }

    /// Header form: `FS:task-id`.
    pub fn header_entry(&self) -> String {
        format!("{}:{}", self.kind.token(), self.predecessor_id)
    }

    /// Parse a header entry of the form `KIND:predecessor-id`.
    pub fn from_header_entry(s: &str) -> Option<Dependency> {
        let (kind, id) = s.split_once(':')?;
        let kind = DepKind::from_token(kind.trim())?;
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        Some(Dependency::new(kind, id))
    }
}

/// How a link is rendered in the `## Links` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// `[[Name]]` wiki-style link into the vault
    Wiki,
    /// `[Title](url)` external link
    External,
}

/// A link attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLink {
    pub id: String,
    pub title: String,
    pub url: String,
    pub kind: LinkKind,
}

/// An ordered subtask entry. Order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

/// Placeholder title used when a task's title trims to nothing.
pub const UNTITLED: &str = "Untitled task";

/// A unit of trackable work.
///
/// `status` and `priority` are names drawn from the owning project's
/// configurable option sets, not hardcoded enums. `completed` correlates
/// with status informally but is toggled independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub links: Vec<TaskLink>,
    /// References into the project's tag list (tag ids).
    #[serde(default)]
    pub tags: Vec<String>,
    /// Back-reference forming a tree. A task is never its own ancestor.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Reference into the project's board-bucket list.
    #[serde(default)]
    pub bucket_id: Option<String>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl Task {
    /// Create a task with the given id, title, and status name.
    /// An empty or whitespace title falls back to a placeholder.
    pub fn new(id: impl Into<String>, title: &str, status: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            title: normalize_title(title),
            status: status.into(),
            completed: false,
            priority: None,
            description: None,
            subtasks: Vec::new(),
            dependencies: Vec::new(),
            links: Vec::new(),
            tags: Vec::new(),
            parent_id: None,
            bucket_id: None,
            collapsed: false,
            created_date: None,
            last_modified_date: None,
            start_date: None,
            due_date: None,
        }
    }
}

/// Trim a title, substituting the placeholder when nothing remains.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Partial update applied by `TaskStore::update_task`. Absent fields are
/// left untouched; `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub dependencies: Option<Vec<Dependency>>,
    pub links: Option<Vec<TaskLink>>,
    pub tags: Option<Vec<String>>,
    pub bucket_id: Option<Option<String>>,
    pub start_date: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
}
