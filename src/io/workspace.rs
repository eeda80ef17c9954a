use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::{value, DocumentMut, Item, Table};

use crate::io::vault::atomic_write;
use crate::model::settings::Settings;
use crate::store::TaskStore;

/// Directory holding plannote state inside a vault.
pub const WORKSPACE_DIR: &str = ".plannote";

/// Error type for workspace I/O operations
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not a plannote vault: no .plannote/ directory found")]
    NotAWorkspace,
    #[error("already initialized (use --force to reinitialize)")]
    AlreadyInitialized,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("could not parse store.json: {0}")]
    StoreParse(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default config written by `pn init`.
const CONFIG_TEMPLATE: &str = "\
# plannote configuration
#
# tag_pattern: checklist lines carrying #<tag_pattern> are imported as
# tasks; #<tag_pattern>/Project-Name routes a line to a named project.
tag_pattern = \"planner\"

# Folders eligible for scanning. Empty = the whole vault.
scan_folders = []
";

/// Discover the vault root by walking up from `start`, looking for a
/// `.plannote/` directory with a config file.
pub fn discover_vault(start: &Path) -> Result<PathBuf, WorkspaceError> {
    let mut current = start.to_path_buf();
    loop {
        let dir = current.join(WORKSPACE_DIR);
        if dir.is_dir() && dir.join("config.toml").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(WorkspaceError::NotAWorkspace);
        }
    }
}

pub fn workspace_dir(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR)
}

pub fn store_path(dir: &Path) -> PathBuf {
    dir.join("store.json")
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join("config.toml")
}

pub fn locations_path(dir: &Path) -> PathBuf {
    dir.join("locations.json")
}

/// Scaffold a workspace: default config, a first project, empty store.
pub fn init_workspace(root: &Path, project_name: &str, force: bool) -> Result<(), WorkspaceError> {
    let dir = workspace_dir(root);
    if settings_path(&dir).exists() && !force {
        return Err(WorkspaceError::AlreadyInitialized);
    }
    fs::create_dir_all(&dir)?;
    atomic_write(&settings_path(&dir), CONFIG_TEMPLATE.as_bytes())?;

    let mut store = TaskStore::new();
    let project_id = format!("proj-{}", uuid::Uuid::new_v4());
    store.add_project(project_id.clone(), project_name);
    save_store(&dir, &store)?;

    // Point scanning at the first project by default
    let mut settings = load_settings(&dir)?;
    settings.default_project = Some(project_id);
    save_settings(&dir, &settings)?;
    Ok(())
}

/// Load settings. A missing file yields defaults.
pub fn load_settings(dir: &Path) -> Result<Settings, WorkspaceError> {
    let path = settings_path(dir);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = fs::read_to_string(&path).map_err(|e| WorkspaceError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Persist settings by editing the existing config file in place, so
/// comments and hand-written keys survive the fields the core owns.
pub fn save_settings(dir: &Path, settings: &Settings) -> Result<(), WorkspaceError> {
    let path = settings_path(dir);
    let existing = fs::read_to_string(&path).unwrap_or_default();
    let mut doc: DocumentMut = existing.parse().unwrap_or_default();

    doc["tag_pattern"] = value(settings.tag_pattern.as_str());

    let mut folders = toml_edit::Array::new();
    for folder in &settings.scan_folders {
        folders.push(folder.as_str());
    }
    doc["scan_folders"] = value(folders);

    match &settings.default_project {
        Some(project) => doc["default_project"] = value(project.as_str()),
        None => {
            doc.remove("default_project");
        }
    }
    match &settings.projects_base_path {
        Some(base) => doc["projects_base_path"] = value(base.as_str()),
        None => {
            doc.remove("projects_base_path");
        }
    }

    if settings.sync.is_empty() {
        doc.remove("sync");
    } else {
        let mut table = Table::new();
        for (project, stamp) in &settings.sync {
            table[project.as_str()] = value(*stamp);
        }
        doc["sync"] = Item::Table(table);
    }

    atomic_write(&path, doc.to_string().as_bytes())?;
    Ok(())
}

/// Load the task store. A missing file yields an empty store.
pub fn load_store(dir: &Path) -> Result<TaskStore, WorkspaceError> {
    let path = store_path(dir);
    if !path.exists() {
        return Ok(TaskStore::new());
    }
    let text = fs::read_to_string(&path).map_err(|e| WorkspaceError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

pub fn save_store(dir: &Path, store: &TaskStore) -> Result<(), WorkspaceError> {
    let content = serde_json::to_string_pretty(store)?;
    atomic_write(&store_path(dir), content.as_bytes())?;
    Ok(())
}
