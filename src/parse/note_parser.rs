use crate::model::task::{Dependency, LinkKind, Subtask, Task, TaskLink};
use crate::parse::frontmatter::Frontmatter;

/// Body-derived fields of a task note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody {
    pub description: Option<String>,
    pub subtasks: Vec<Subtask>,
    pub links: Vec<TaskLink>,
}

/// Parse the free-form body of a task note. Never fails: malformed or
/// missing content yields absent fields.
///
/// - description: everything between the header and the first `##`
///   heading or the footer delimiter (`---`), trimmed.
/// - subtasks: every checklist line at or after a `## Subtasks` heading.
/// - links: `- [[Name]]` and `- [Title](URL)` lines inside `## Links`.
pub fn parse_document(text: &str) -> ParsedBody {
    let lines: Vec<&str> = text.lines().collect();

    let body_start = match Frontmatter::parse(&lines) {
        Some((_, idx)) => idx,
        None => {
            if lines.first().map(|l| l.trim()) == Some("---") {
                // Opened but never closed — no usable body
                return ParsedBody::default();
            }
            // No header at all: treat the whole text as body
            0
        }
    };

    let mut body = ParsedBody::default();
    let mut description_lines: Vec<&str> = Vec::new();
    let mut in_description = true;
    let mut seen_subtasks_heading = false;
    let mut in_links = false;
    let mut sub_count = 0usize;
    let mut link_count = 0usize;

    for &line in &lines[body_start..] {
        let trimmed = line.trim();

        if trimmed.starts_with("##") {
            in_description = false;
            let heading = trimmed.trim_start_matches('#').trim();
            if heading.eq_ignore_ascii_case("Subtasks") {
                seen_subtasks_heading = true;
                in_links = false;
            } else if heading.eq_ignore_ascii_case("Links") {
                in_links = true;
            } else {
                in_links = false;
            }
            continue;
        }

        if trimmed == "---" {
            // Footer delimiter ends the description region
            in_description = false;
            in_links = false;
            continue;
        }

        if in_description {
            description_lines.push(line);
            continue;
        }

        if in_links {
            if let Some(link) = parse_link_line(trimmed) {
                link_count += 1;
                body.links.push(TaskLink {
                    id: format!("link-{}", link_count),
                    title: link.0,
                    url: link.1,
                    kind: link.2,
                });
            }
            continue;
        }

        if seen_subtasks_heading
            && let Some((completed, title)) = parse_checklist_line(trimmed)
        {
            sub_count += 1;
            body.subtasks.push(Subtask {
                id: format!("sub-{}", sub_count),
                title: title.to_string(),
                completed,
            });
        }
    }

    let description = description_lines.join("\n");
    let description = description.trim();
    if !description.is_empty() {
        body.description = Some(description.to_string());
    }

    body
}

/// Parse a checklist line: `- [ ] title` / `- [x] title` (any case).
/// Returns (completed, title).
pub fn parse_checklist_line(line: &str) -> Option<(bool, &str)> {
    let rest = line.strip_prefix("- [")?;
    let mark = rest.chars().next()?;
    let completed = match mark {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let rest = &rest[mark.len_utf8()..];
    let rest = rest.strip_prefix(']')?;
    Some((completed, rest.trim()))
}

/// Parse a link line inside `## Links`. Returns (title, url, kind).
fn parse_link_line(line: &str) -> Option<(String, String, LinkKind)> {
    let rest = line.strip_prefix("- ")?.trim();

    if let Some(inner) = rest.strip_prefix("[[").and_then(|r| r.strip_suffix("]]")) {
        let name = inner.trim();
        if name.is_empty() {
            return None;
        }
        return Some((name.to_string(), name.to_string(), LinkKind::Wiki));
    }

    let inner = rest.strip_prefix('[')?;
    let close = inner.find("](")?;
    let title = inner[..close].trim();
    let url = inner[close + 2..].strip_suffix(')')?.trim();
    if url.is_empty() {
        return None;
    }
    Some((title.to_string(), url.to_string(), LinkKind::External))
}

/// Reconstruct a task from a full note document.
///
/// Requires a header carrying at least `id` and `title`; anything else
/// degrades gracefully. Returns `None` when there is nothing to sync.
pub fn markdown_to_task(text: &str) -> Option<Task> {
    let lines: Vec<&str> = text.lines().collect();
    let (fm, _) = Frontmatter::parse(&lines)?;

    let id = fm.scalar("id")?.trim();
    let title = fm.scalar("title")?.trim();
    if id.is_empty() || title.is_empty() {
        return None;
    }

    let status = fm.scalar("status").unwrap_or("Not Started");
    let mut task = Task::new(id, title, status);
    task.completed = fm.bool("completed").unwrap_or(false);
    task.priority = fm.scalar("priority").map(str::to_string);
    task.parent_id = fm.scalar("parentId").map(str::to_string);
    task.bucket_id = fm.scalar("bucketId").map(str::to_string);
    task.start_date = fm.scalar("startDate").map(str::to_string);
    task.due_date = fm.scalar("dueDate").map(str::to_string);
    task.created_date = fm.scalar("createdDate").map(str::to_string);
    task.last_modified_date = fm.scalar("lastModifiedDate").map(str::to_string);
    task.collapsed = fm.bool("collapsed").unwrap_or(false);

    if let Some(tags) = fm.list("tags") {
        task.tags = tags.to_vec();
    }
    if let Some(deps) = fm.list("dependencies") {
        task.dependencies = deps
            .iter()
            .filter_map(|d| Dependency::from_header_entry(d))
            .collect();
    }

    let body = parse_document(text);
    task.description = body.description;
    task.subtasks = body.subtasks;
    task.links = body.links;

    Some(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::DepKind;

    const FULL_NOTE: &str = "\
---
id: task-7
title: Ship the importer
status: In Progress
completed: false
priority: High
startDate: 2026-02-01
dueDate: 2026-03-15
createdDate: 2026-01-20
lastModifiedDate: 2026-02-02
tags:
  - tag-infra
dependencies:
  - FS:task-3
  - SS:task-4
---

Multi-line description.

Second paragraph with detail.

## Subtasks

- [x] Draft the schema
- [ ] Wire the scanner

## Dependencies

- FS: [[Earlier Task]]
- SS: task-4

## Links

- [[Planning Note]]
- [Tracker](https://example.com/i/42)

---
*Task from Project: Work*
";

    #[test]
    fn test_parse_document_full() {
        let body = parse_document(FULL_NOTE);
        assert_eq!(
            body.description.as_deref(),
            Some("Multi-line description.\n\nSecond paragraph with detail.")
        );
        assert_eq!(body.subtasks.len(), 2);
        assert!(body.subtasks[0].completed);
        assert_eq!(body.subtasks[0].title, "Draft the schema");
        assert_eq!(body.subtasks[1].title, "Wire the scanner");
        assert_eq!(body.links.len(), 2);
        assert_eq!(body.links[0].kind, LinkKind::Wiki);
        assert_eq!(body.links[0].url, "Planning Note");
        assert_eq!(body.links[1].kind, LinkKind::External);
        assert_eq!(body.links[1].title, "Tracker");
        assert_eq!(body.links[1].url, "https://example.com/i/42");
    }

    #[test]
    fn test_markdown_to_task_full() {
        let task = markdown_to_task(FULL_NOTE).unwrap();
        assert_eq!(task.id, "task-7");
        assert_eq!(task.title, "Ship the importer");
        assert_eq!(task.status, "In Progress");
        assert!(!task.completed);
        assert_eq!(task.priority.as_deref(), Some("High"));
        assert_eq!(task.due_date.as_deref(), Some("2026-03-15"));
        assert_eq!(task.tags, vec!["tag-infra"]);
        assert_eq!(task.dependencies.len(), 2);
        assert_eq!(task.dependencies[0], Dependency::new(DepKind::FS, "task-3"));
        assert_eq!(task.subtasks.len(), 2);
        assert_eq!(task.links.len(), 2);
    }

    #[test]
    fn test_missing_header_returns_none() {
        assert!(markdown_to_task("Just some note text\n").is_none());
        assert!(markdown_to_task("").is_none());
    }

    #[test]
    fn test_missing_id_or_title_returns_none() {
        assert!(markdown_to_task("---\ntitle: No id\n---\n").is_none());
        assert!(markdown_to_task("---\nid: task-1\n---\n").is_none());
        assert!(markdown_to_task("---\nid: task-1\ntitle:\n---\n").is_none());
    }

    #[test]
    fn test_header_only_note() {
        let task = markdown_to_task("---\nid: task-1\ntitle: Bare\n---\n").unwrap();
        assert_eq!(task.status, "Not Started");
        assert!(task.description.is_none());
        assert!(task.subtasks.is_empty());
        assert!(task.links.is_empty());
    }

    #[test]
    fn test_malformed_dependency_entries_dropped() {
        let task = markdown_to_task(
            "---\nid: t\ntitle: T\ndependencies:\n  - FS:task-1\n  - bogus\n  - XX:task-2\n---\n",
        )
        .unwrap();
        assert_eq!(task.dependencies.len(), 1);
        assert_eq!(task.dependencies[0].predecessor_id, "task-1");
    }

    #[test]
    fn test_description_absent_when_body_is_footer_only() {
        let body = parse_document("---\nid: t\ntitle: T\n---\n\n---\n*Task from Project: X*\n");
        assert!(body.description.is_none());
    }

    #[test]
    fn test_description_absent_on_unclosed_header() {
        let body = parse_document("---\nid: t\ntitle: T\nDescription-looking text");
        assert_eq!(body, ParsedBody::default());
    }

    #[test]
    fn test_subtasks_after_heading_case_insensitive_x() {
        let body = parse_document(
            "---\nid: t\ntitle: T\n---\n## Subtasks\n- [X] Upper\n- [ ] Lower\n",
        );
        assert_eq!(body.subtasks.len(), 2);
        assert!(body.subtasks[0].completed);
        assert!(!body.subtasks[1].completed);
    }

    #[test]
    fn test_checklist_lines_before_heading_not_subtasks() {
        let body = parse_document(
            "---\nid: t\ntitle: T\n---\n\nIntro text\n\n## Notes\n- [ ] Not a subtask\n",
        );
        assert!(body.subtasks.is_empty());
        assert_eq!(body.description.as_deref(), Some("Intro text"));
    }

    #[test]
    fn test_hand_edited_subtasks_without_blank_line() {
        // Hand edits often drop the blank line after the heading
        let body = parse_document("---\nid: t\ntitle: T\n---\n## Subtasks\n- [ ] Tight\n");
        assert_eq!(body.subtasks.len(), 1);
        assert_eq!(body.subtasks[0].title, "Tight");
    }

    #[test]
    fn test_malformed_link_lines_skipped() {
        let body = parse_document(
            "---\nid: t\ntitle: T\n---\n## Links\n- [[]]\n- [broken](\n- not a link\n- [[Good]]\n",
        );
        assert_eq!(body.links.len(), 1);
        assert_eq!(body.links[0].url, "Good");
    }

    #[test]
    fn test_parse_checklist_line() {
        assert_eq!(parse_checklist_line("- [ ] Open"), Some((false, "Open")));
        assert_eq!(parse_checklist_line("- [x] Done"), Some((true, "Done")));
        assert_eq!(parse_checklist_line("- [X] Done"), Some((true, "Done")));
        assert_eq!(parse_checklist_line("- [>] Other"), None);
        assert_eq!(parse_checklist_line("* [ ] Star"), None);
    }
}
