use std::collections::HashSet;

use crate::io::synclog::{SyncCategory, SyncLog};
use crate::io::vault::Vault;
use crate::model::settings::Settings;
use crate::model::task::{Task, TaskPatch};
use crate::parse::extract::{LinePatterns, ScanFields};
use crate::store::{today_str, TaskStore};
use crate::sync::locations::LocationMap;

/// Totals from a scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub created: usize,
    pub updated: usize,
}

impl ScanStats {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }

    fn absorb(&mut self, other: ScanStats) {
        self.created += other.created;
        self.updated += other.updated;
    }
}

/// The daily-note import engine: finds tagged checklist lines, assigns
/// stable identity through the location map, and reconciles each line
/// against the store.
pub struct NoteScanner {
    patterns: LinePatterns,
    scan_folders: Vec<String>,
    default_project: Option<String>,
    locations: LocationMap,
    /// Task ids already handled in the current pass. Guards duplicate
    /// writes when the same id surfaces twice before the pass ends.
    processed: HashSet<String>,
    log: SyncLog,
}

impl NoteScanner {
    pub fn new(settings: &Settings, locations: LocationMap, log: SyncLog) -> Self {
        NoteScanner {
            patterns: LinePatterns::new(&settings.tag_pattern),
            scan_folders: settings.scan_folders.clone(),
            default_project: settings.default_project.clone(),
            locations,
            processed: HashSet::new(),
            log,
        }
    }

    /// The location identity map, for persistence by the host.
    pub fn locations(&self) -> &LocationMap {
        &self.locations
    }

    /// Start a new scan pass: forget which ids this pass has written.
    /// Call once before a batch of `scan_file`s; `scan_all_notes` does
    /// it itself.
    pub fn begin_pass(&mut self) {
        self.processed.clear();
    }

    /// Scan one document. Skips non-markdown paths and paths outside
    /// the configured scan folders. Returns created/updated counts.
    pub fn scan_file(&mut self, store: &mut TaskStore, vault: &dyn Vault, path: &str) -> ScanStats {
        let mut stats = ScanStats::default();
        if !path.ends_with(".md") || !self.in_scan_folders(path) {
            return stats;
        }

        let text = match vault.read(path) {
            Ok(text) => text,
            Err(e) => {
                self.log.record(SyncCategory::Scan, path, &e.to_string());
                return stats;
            }
        };

        let mut observed: HashSet<usize> = HashSet::new();
        for (line_number, line) in text.lines().enumerate() {
            let Some(fields) = self.patterns.extract(line) else {
                continue;
            };
            observed.insert(line_number);

            let task_id = self.locations.resolve_or_create(path, line_number);
            if !self.processed.insert(task_id.clone()) {
                continue;
            }

            match self.apply_line(store, &task_id, &fields) {
                Some(true) => stats.created += 1,
                Some(false) => stats.updated += 1,
                None => {
                    self.log.record(
                        SyncCategory::Scan,
                        path,
                        &format!(
                            "line {}: no project for task {:?}, skipped",
                            line_number + 1,
                            fields.title
                        ),
                    );
                }
            }
        }

        // Lines that lost their tag (or vanished) release their identity
        self.locations.retain_observed(path, &observed);
        stats
    }

    /// Reconcile one extracted line with the store.
    /// Returns Some(true) on create, Some(false) on update, None when
    /// the target project cannot be resolved.
    fn apply_line(&self, store: &mut TaskStore, task_id: &str, fields: &ScanFields) -> Option<bool> {
        let project_id = self.resolve_project(store, fields)?;
        let project = store.project(&project_id)?;

        // Freeform tag names resolve against the project's tag list;
        // unmatched tokens are dropped, never invented.
        let tags: Vec<String> = fields
            .tag_names
            .iter()
            .filter_map(|name| project.tag_by_name(name).map(|t| t.id.clone()))
            .collect();

        if store.get_task(task_id).is_none() {
            let mut task = Task::new(task_id, &fields.title, project.default_status());
            task.completed = fields.completed;
            task.priority = fields.priority.clone();
            task.due_date = fields.due_date.clone();
            task.tags = tags;
            task.created_date = Some(today_str());
            store.add_task_to_project(task, &project_id).ok()?;
            Some(true)
        } else {
            store
                .update_task(
                    task_id,
                    TaskPatch {
                        title: Some(fields.title.clone()),
                        completed: Some(fields.completed),
                        priority: Some(fields.priority.clone()),
                        due_date: Some(fields.due_date.clone()),
                        tags: Some(tags),
                        ..TaskPatch::default()
                    },
                )
                .ok()?;
            Some(false)
        }
    }

    /// Routing tag first, configured default project otherwise.
    /// A routing tag naming an unknown project resolves to nothing.
    fn resolve_project(&self, store: &TaskStore, fields: &ScanFields) -> Option<String> {
        match &fields.routed_project {
            Some(name) => store.project_by_name(name).map(|p| p.id.clone()),
            None => {
                let id = self.default_project.as_deref()?;
                store.project(id).map(|p| p.id.clone())
            }
        }
    }

    fn in_scan_folders(&self, path: &str) -> bool {
        self.scan_folders.is_empty()
            || self.scan_folders.iter().any(|folder| path.starts_with(folder.as_str()))
    }

    /// Scan every markdown document in the vault as one pass.
    pub fn scan_all_notes(&mut self, store: &mut TaskStore, vault: &dyn Vault) -> ScanStats {
        self.begin_pass();
        let mut stats = ScanStats::default();
        for path in vault.markdown_files() {
            stats.absorb(self.scan_file(store, vault, &path));
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::vault::MemVault;
    use pretty_assertions::assert_eq;

    fn settings_with_default() -> Settings {
        let mut settings = Settings::default();
        settings.default_project = Some("p1".into());
        settings
    }

    fn scanner(settings: &Settings) -> NoteScanner {
        NoteScanner::new(settings, LocationMap::new(), SyncLog::disabled())
    }

    fn store() -> TaskStore {
        let mut store = TaskStore::new();
        store.add_project("p1", "Inbox");
        store.add_project("p2", "My Multi Word Project");
        store
    }

    #[test]
    fn test_scan_creates_task_with_fields() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed(
            "Daily/2026-08-06.md",
            "# Today\n\n- [ ] Ship release !! 📅 2026-09-01 #planner\n- [x] Done thing #planner\n",
        );

        let stats = scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(stats, ScanStats { created: 2, updated: 0 });

        let project = store.project("p1").unwrap();
        assert_eq!(project.tasks.len(), 2);
        let task = project.tasks.values().next().unwrap();
        assert_eq!(task.title, "Ship release");
        assert_eq!(task.priority.as_deref(), Some("High"));
        assert_eq!(task.due_date.as_deref(), Some("2026-09-01"));
        assert!(task.created_date.is_some());

        let done = project.tasks.values().nth(1).unwrap();
        assert!(done.completed);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] Same line #planner\n");

        let first = scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(first.created, 1);
        let first_id = scanner.locations().get("Daily/a.md", 0).unwrap().to_string();

        let second = scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);

        // Same location, same identity, no duplicate task
        assert_eq!(scanner.locations().get("Daily/a.md", 0), Some(first_id.as_str()));
        assert_eq!(store.project("p1").unwrap().tasks.len(), 1);
    }

    #[test]
    fn test_edit_in_place_updates_not_duplicates() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] Original wording #planner\n");

        scanner.scan_all_notes(&mut store, &vault);
        let id = scanner.locations().get("Daily/a.md", 0).unwrap().to_string();
        let created = store.get_task(&id).unwrap().created_date.clone();

        vault
            .modify("Daily/a.md", "- [x] Reworded line ! #planner\n")
            .unwrap();
        let stats = scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(stats, ScanStats { created: 0, updated: 1 });

        let task = store.get_task(&id).unwrap();
        assert_eq!(task.title, "Reworded line");
        assert!(task.completed);
        assert_eq!(task.priority.as_deref(), Some("Medium"));
        // createdDate untouched, lastModifiedDate stamped
        assert_eq!(task.created_date, created);
        assert!(task.last_modified_date.is_some());
        assert_eq!(store.project("p1").unwrap().tasks.len(), 1);
    }

    #[test]
    fn test_untagged_line_releases_location() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] First #planner\n- [ ] Second #planner\n");

        scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(scanner.locations().len(), 2);

        // The second line loses its tag
        vault
            .modify("Daily/a.md", "- [ ] First #planner\n- [ ] Second, detagged\n")
            .unwrap();
        scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(scanner.locations().len(), 1);
        assert!(scanner.locations().get("Daily/a.md", 0).is_some());
        assert!(scanner.locations().get("Daily/a.md", 1).is_none());
    }

    #[test]
    fn test_routing_tag_targets_named_project() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] X #planner/My-Multi-Word-Project\n");

        scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(store.project("p1").unwrap().tasks.len(), 0);
        assert_eq!(store.project("p2").unwrap().tasks.len(), 1);
    }

    #[test]
    fn test_bare_tag_routes_to_default_project() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] X #planner\n");

        scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(store.project("p1").unwrap().tasks.len(), 1);
    }

    #[test]
    fn test_unresolvable_project_skips_line() {
        let mut settings = Settings::default();
        settings.default_project = None;
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed(
            "Daily/a.md",
            "- [ ] Unknown route #planner/Nowhere\n- [ ] No default #planner\n",
        );

        let stats = scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(stats.total(), 0);
        assert_eq!(store.all_tasks().count(), 0);
    }

    #[test]
    fn test_scan_folder_allow_list() {
        let mut settings = settings_with_default();
        settings.scan_folders = vec!["Daily".into()];
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/in.md", "- [ ] Inside #planner\n");
        vault.seed("Archive/out.md", "- [ ] Outside #planner\n");

        let stats = scanner.scan_all_notes(&mut store, &vault);
        assert_eq!(stats.created, 1);
        assert_eq!(store.all_tasks().next().unwrap().title, "Inside");
    }

    #[test]
    fn test_non_markdown_paths_skipped() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/notes.txt", "- [ ] Not markdown #planner\n");

        let stats = scanner.scan_file(&mut store, &vault, "Daily/notes.txt");
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_processed_guard_skips_second_write_in_one_pass() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] Guarded line #planner\n");

        scanner.begin_pass();
        let first = scanner.scan_file(&mut store, &vault, "Daily/a.md");
        // Same file flushed twice in the same pass (e.g. duplicated
        // change events): the second scan sees an already-processed id
        let second = scanner.scan_file(&mut store, &vault, "Daily/a.md");
        assert_eq!(first.total(), 1);
        assert_eq!(second.total(), 0);
        assert_eq!(store.all_tasks().count(), 1);
    }

    #[test]
    fn test_tags_resolved_case_insensitively_and_dropped() {
        let settings = settings_with_default();
        let mut scanner = scanner(&settings);
        let mut store = store();
        store.add_tag_option("p1", "Urgent", "#f00").unwrap();
        let mut vault = MemVault::new();
        vault.seed("Daily/a.md", "- [ ] Tagged #planner #URGENT #unknown\n");

        scanner.scan_all_notes(&mut store, &vault);
        let task = store.all_tasks().next().unwrap();
        assert_eq!(task.tags.len(), 1);
        let project = store.project("p1").unwrap();
        assert_eq!(project.tags.iter().find(|t| t.id == task.tags[0]).unwrap().name, "Urgent");
    }
}
