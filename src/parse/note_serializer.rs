use crate::model::task::{LinkKind, Task};
use crate::parse::frontmatter::Frontmatter;

/// Serialize a task to its canonical note text.
///
/// Output is deterministic for identical input: header keys are emitted
/// in a fixed order and body sections appear only when non-empty. The
/// `resolve_title` callback maps a predecessor id to its display title
/// for the human-readable `## Dependencies` lines; the machine-readable
/// header entry is emitted whether or not the predecessor resolves.
pub fn task_to_document<F>(task: &Task, project_name: &str, resolve_title: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = header(task).to_text();

    if let Some(ref description) = task.description {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }

    if !task.subtasks.is_empty() {
        out.push_str("\n## Subtasks\n\n");
        for sub in &task.subtasks {
            let mark = if sub.completed { 'x' } else { ' ' };
            out.push_str(&format!("- [{}] {}\n", mark, sub.title));
        }
    }

    if !task.dependencies.is_empty() {
        out.push_str("\n## Dependencies\n\n");
        for dep in &task.dependencies {
            match resolve_title(&dep.predecessor_id) {
                Some(title) => {
                    out.push_str(&format!("- {}: [[{}]]\n", dep.kind.token(), title));
                }
                // Unresolved predecessor — keep the machine form only
                None => {
                    out.push_str(&format!("- {}: {}\n", dep.kind.token(), dep.predecessor_id));
                }
            }
        }
    }

    if !task.links.is_empty() {
        out.push_str("\n## Links\n\n");
        for link in &task.links {
            match link.kind {
                LinkKind::Wiki => {
                    out.push_str(&format!("- [[{}]]\n", link.url));
                }
                LinkKind::External => {
                    out.push_str(&format!("- [{}]({})\n", link.title, link.url));
                }
            }
        }
    }

    out.push_str(&format!("\n---\n*Task from Project: {}*\n", project_name));
    out
}

/// Build the metadata header in canonical key order.
fn header(task: &Task) -> Frontmatter {
    let mut fm = Frontmatter::new();
    fm.set_scalar("id", task.id.as_str());
    fm.set_scalar("title", task.title.as_str());
    fm.set_scalar("status", task.status.as_str());
    fm.set_scalar("completed", if task.completed { "true" } else { "false" });

    if let Some(ref priority) = task.priority {
        fm.set_scalar("priority", priority.as_str());
    }
    if let Some(ref parent_id) = task.parent_id {
        fm.set_scalar("parentId", parent_id.as_str());
    }
    if let Some(ref bucket_id) = task.bucket_id {
        fm.set_scalar("bucketId", bucket_id.as_str());
    }
    if let Some(ref date) = task.start_date {
        fm.set_scalar("startDate", date.as_str());
    }
    if let Some(ref date) = task.due_date {
        fm.set_scalar("dueDate", date.as_str());
    }
    if let Some(ref date) = task.created_date {
        fm.set_scalar("createdDate", date.as_str());
    }
    if let Some(ref date) = task.last_modified_date {
        fm.set_scalar("lastModifiedDate", date.as_str());
    }
    if !task.tags.is_empty() {
        fm.set_list("tags", task.tags.clone());
    }
    if !task.dependencies.is_empty() {
        fm.set_list(
            "dependencies",
            task.dependencies.iter().map(|d| d.header_entry()).collect(),
        );
    }
    if task.collapsed {
        fm.set_scalar("collapsed", "true");
    }
    fm
}
