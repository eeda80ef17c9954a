use crate::model::project::Project;
use crate::model::settings::Settings;

/// Characters illegal in a filesystem path component.
const ILLEGAL: &[char] = &[':', '/', '\\', '*', '?', '"', '<', '>', '|'];

/// Replace every path-illegal character with `-`, one for one.
/// The string keeps its length; spaces are retained.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if ILLEGAL.contains(&c) { '-' } else { c })
        .collect()
}

/// Folder holding a project's task notes: `{base/}{project}/Tasks`.
pub fn tasks_folder(project_name: &str, base_path: Option<&str>) -> String {
    match base_path.filter(|b| !b.is_empty()) {
        Some(base) => format!("{}/{}/Tasks", base.trim_end_matches('/'), project_name),
        None => format!("{}/Tasks", project_name),
    }
}

/// Vault-relative path of a task's note.
pub fn task_file_path(title: &str, project_name: &str, base_path: Option<&str>) -> String {
    format!(
        "{}/{}.md",
        tasks_folder(project_name, base_path),
        sanitize_title(title)
    )
}

/// The base path effective for a project: its own override first, the
/// global setting otherwise.
pub fn effective_base_path<'a>(project: &'a Project, settings: &'a Settings) -> Option<&'a str> {
    project
        .base_path
        .as_deref()
        .or(settings.projects_base_path.as_deref())
}
