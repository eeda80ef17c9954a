use std::collections::HashSet;

use crate::io::synclog::{SyncCategory, SyncLog};
use crate::io::vault::Vault;
use crate::model::settings::Settings;
use crate::parse::note_parser::markdown_to_task;
use crate::parse::note_serializer::task_to_document;
use crate::store::{StoreEvent, TaskStore};
use crate::sync::paths::{effective_base_path, task_file_path, tasks_folder};

/// A full project sync is skipped when the last one finished within
/// this window.
pub const SYNC_RECENCY_MS: i64 = 5 * 60 * 1000;

/// Per-key mutual exclusion with acquire-or-skip semantics.
///
/// A second acquisition of a held key is dropped, not queued. This is
/// the guard that keeps a note write from re-triggering an immediate
/// re-read of that same write.
#[derive(Debug, Default)]
pub struct BusyKeys {
    active: HashSet<String>,
}

impl BusyKeys {
    /// Take the key. Returns false (caller must skip) if already held.
    pub fn try_acquire(&mut self, key: &str) -> bool {
        self.active.insert(key.to_string())
    }

    pub fn release(&mut self, key: &str) {
        self.active.remove(key);
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.active.contains(key)
    }
}

/// Orchestrates task→note writes, note→task reads, renames, and
/// project-wide syncs. Collaborators are passed per call so one
/// coordinator can serve any store/vault pairing; only the reentrancy
/// guard and the log live here.
pub struct SyncCoordinator {
    busy: BusyKeys,
    log: SyncLog,
}

impl SyncCoordinator {
    pub fn new(log: SyncLog) -> Self {
        SyncCoordinator {
            busy: BusyKeys::default(),
            log,
        }
    }

    /// The reentrancy guard, exposed so hosts can hold a key across
    /// their own compound operations.
    pub fn busy(&mut self) -> &mut BusyKeys {
        &mut self.busy
    }

    // -----------------------------------------------------------------------
    // Task → note
    // -----------------------------------------------------------------------

    /// Write a task's canonical note, creating the project's Tasks
    /// folder and the note as needed. Unresolved project: no-op.
    pub fn sync_task_to_markdown(
        &mut self,
        store: &TaskStore,
        settings: &Settings,
        vault: &mut dyn Vault,
        task_id: &str,
        project_id: &str,
    ) {
        let Some(project) = store.project(project_id) else {
            return;
        };
        let Some(task) = project.tasks.get(task_id) else {
            return;
        };
        let base = effective_base_path(project, settings);

        let folder = tasks_folder(&project.name, base);
        if !vault.is_folder(&folder)
            && let Err(e) = vault.create_folder(&folder)
        {
            self.log.record(SyncCategory::Write, &folder, &e.to_string());
            return;
        }

        let content = task_to_document(task, &project.name, |id| {
            project.tasks.get(id).map(|t| t.title.clone())
        });
        let path = task_file_path(&task.title, &project.name, base);

        let result = if vault.exists(&path) {
            vault.modify(&path, &content)
        } else {
            vault.create(&path, &content)
        };
        if let Err(e) = result {
            self.log.record(SyncCategory::Write, &path, &e.to_string());
        }
    }

    /// A task's title changed: drop the note at the old path
    /// (best-effort) and write it fresh at the new one. A failed delete
    /// never blocks the create.
    pub fn handle_task_rename(
        &mut self,
        store: &TaskStore,
        settings: &Settings,
        vault: &mut dyn Vault,
        task_id: &str,
        old_title: &str,
        project_id: &str,
    ) {
        if let Some(project) = store.project(project_id) {
            let base = effective_base_path(project, settings);
            let old_path = task_file_path(old_title, &project.name, base);
            if vault.exists(&old_path)
                && let Err(e) = vault.remove(&old_path)
            {
                self.log
                    .record(SyncCategory::Delete, &old_path, &e.to_string());
            }
        }
        self.sync_task_to_markdown(store, settings, vault, task_id, project_id);
    }

    /// Remove the note backing a (deleted) task. No-op when absent.
    pub fn delete_task_markdown(
        &mut self,
        store: &TaskStore,
        settings: &Settings,
        vault: &mut dyn Vault,
        title: &str,
        project_id: &str,
    ) {
        let Some(project) = store.project(project_id) else {
            return;
        };
        let base = effective_base_path(project, settings);
        let path = task_file_path(title, &project.name, base);
        if vault.exists(&path)
            && let Err(e) = vault.remove(&path)
        {
            self.log.record(SyncCategory::Delete, &path, &e.to_string());
        }
    }

    // -----------------------------------------------------------------------
    // Note → task
    // -----------------------------------------------------------------------

    /// Read a note back into the store. Gated by the reentrancy guard:
    /// a concurrent invocation for the same path is dropped entirely.
    /// Returns whether a store write happened.
    pub fn sync_markdown_to_task(
        &mut self,
        store: &mut TaskStore,
        settings: &Settings,
        vault: &mut dyn Vault,
        path: &str,
        project_id: &str,
    ) -> bool {
        if !self.busy.try_acquire(path) {
            return false;
        }
        let applied = self.apply_markdown(store, settings, vault, path, project_id);
        self.busy.release(path);
        applied
    }

    fn apply_markdown(
        &mut self,
        store: &mut TaskStore,
        settings: &Settings,
        vault: &mut dyn Vault,
        path: &str,
        project_id: &str,
    ) -> bool {
        let content = match vault.read(path) {
            Ok(content) => content,
            Err(e) => {
                self.log.record(SyncCategory::Parse, path, &e.to_string());
                return false;
            }
        };
        let Some(task) = markdown_to_task(&content) else {
            // Nothing to sync
            return false;
        };
        let Some(project) = store.project(project_id) else {
            return false;
        };
        let project_name = project.name.clone();
        let base = effective_base_path(project, settings).map(str::to_string);

        // The note may carry a new title for a known task; move the
        // backing document before applying the field update.
        if let Some(existing) = store.get_task(&task.id)
            && existing.title != task.title
        {
            let new_path = task_file_path(&task.title, &project_name, base.as_deref());
            if new_path != path
                && let Err(e) = vault.rename(path, &new_path)
            {
                self.log.record(SyncCategory::Rename, path, &e.to_string());
            }
        }

        store.add_task_from_object(task, project_id).is_ok()
    }

    // -----------------------------------------------------------------------
    // Project-wide sync
    // -----------------------------------------------------------------------

    /// Read every note under a project's Tasks folder back into the
    /// store, then record the sync time through `save_settings`.
    ///
    /// Skipped entirely while the last sync is fresh. Missing project or
    /// missing folder: no-op. Individual unreadable or unparseable notes
    /// are skipped, never aborting the batch. Returns the number of
    /// notes applied.
    pub fn initial_sync(
        &mut self,
        store: &mut TaskStore,
        settings: &mut Settings,
        vault: &mut dyn Vault,
        project_id: &str,
        now_ms: i64,
        mut save_settings: impl FnMut(&Settings),
    ) -> usize {
        let Some(project) = store.project(project_id) else {
            return 0;
        };
        if let Some(last) = settings.sync.get(project_id)
            && now_ms.saturating_sub(*last) < SYNC_RECENCY_MS
        {
            return 0;
        }

        let name = project.name.clone();
        let base = effective_base_path(project, settings).map(str::to_string);
        let folder = tasks_folder(&name, base.as_deref());
        if !vault.is_folder(&folder) {
            return 0;
        }

        let prefix = format!("{}/", folder);
        let files: Vec<String> = vault
            .markdown_files()
            .into_iter()
            .filter(|p| p.starts_with(&prefix))
            .collect();

        let mut applied = 0;
        for file in &files {
            if self.sync_markdown_to_task(store, settings, vault, file, project_id) {
                applied += 1;
            }
        }

        settings.sync.insert(project_id.to_string(), now_ms);
        save_settings(settings);
        applied
    }

    // -----------------------------------------------------------------------
    // Store-event glue
    // -----------------------------------------------------------------------

    /// Drain the store's change queue and mirror each change into the
    /// vault. This is the steady-state task→note direction.
    pub fn process_events(
        &mut self,
        store: &mut TaskStore,
        settings: &Settings,
        vault: &mut dyn Vault,
    ) {
        for event in store.take_events() {
            match event {
                StoreEvent::TaskAdded {
                    project_id,
                    task_id,
                }
                | StoreEvent::TaskUpdated {
                    project_id,
                    task_id,
                } => {
                    self.sync_task_to_markdown(store, settings, vault, &task_id, &project_id);
                }
                StoreEvent::TaskRenamed {
                    project_id,
                    task_id,
                    old_title,
                } => {
                    self.handle_task_rename(
                        store, settings, vault, &task_id, &old_title, &project_id,
                    );
                }
                StoreEvent::TaskDeleted {
                    project_id, title, ..
                } => {
                    self.delete_task_markdown(store, settings, vault, &title, &project_id);
                }
            }
        }
    }
}

/// Which project's Tasks folder a note path falls under, if any.
pub fn project_for_path(store: &TaskStore, settings: &Settings, path: &str) -> Option<String> {
    store.projects.values().find_map(|project| {
        let base = effective_base_path(project, settings);
        let prefix = format!("{}/", tasks_folder(&project.name, base));
        path.starts_with(&prefix).then(|| project.id.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::vault::MemVault;
    use crate::model::task::TaskPatch;
    use pretty_assertions::assert_eq;

    fn coordinator() -> SyncCoordinator {
        SyncCoordinator::new(SyncLog::disabled())
    }

    fn setup() -> (TaskStore, Settings, MemVault) {
        let mut store = TaskStore::new();
        store.add_project("p1", "Work");
        (store, Settings::default(), MemVault::new())
    }

    #[test]
    fn test_sync_task_creates_note_and_folder() {
        let (mut store, settings, mut vault) = setup();
        let task = store.add_task("Write the codec").unwrap();
        let mut sync = coordinator();

        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p1");

        assert!(vault.is_folder("Work/Tasks"));
        let content = vault.read("Work/Tasks/Write the codec.md").unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains(&format!("id: {}", task.id)));
        assert!(content.ends_with("*Task from Project: Work*\n"));
    }

    #[test]
    fn test_sync_task_unresolved_project_is_noop() {
        let (mut store, settings, mut vault) = setup();
        let task = store.add_task("Orphan").unwrap();
        let mut sync = coordinator();

        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p-missing");
        assert!(vault.markdown_files().is_empty());
    }

    #[test]
    fn test_sync_task_overwrites_existing_note() {
        let (mut store, settings, mut vault) = setup();
        let task = store.add_task("Stable title").unwrap();
        let mut sync = coordinator();

        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p1");
        store
            .update_task(
                &task.id,
                TaskPatch {
                    completed: Some(true),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p1");

        let content = vault.read("Work/Tasks/Stable title.md").unwrap();
        assert!(content.contains("completed: true"));
        assert_eq!(vault.markdown_files().len(), 1);
    }

    #[test]
    fn test_handle_rename_moves_note() {
        let (mut store, settings, mut vault) = setup();
        let task = store.add_task("Old name").unwrap();
        let mut sync = coordinator();
        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p1");

        store
            .update_task(
                &task.id,
                TaskPatch {
                    title: Some("New name".into()),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        sync.handle_task_rename(&store, &settings, &mut vault, &task.id, "Old name", "p1");

        assert!(!vault.exists("Work/Tasks/Old name.md"));
        let content = vault.read("Work/Tasks/New name.md").unwrap();
        assert!(content.contains("title: New name"));
    }

    #[test]
    fn test_rename_with_missing_old_note_still_creates() {
        let (mut store, settings, mut vault) = setup();
        let task = store.add_task("Fresh").unwrap();
        let mut sync = coordinator();

        // No note was ever written for the old title
        sync.handle_task_rename(&store, &settings, &mut vault, &task.id, "Never existed", "p1");
        assert!(vault.exists("Work/Tasks/Fresh.md"));
    }

    #[test]
    fn test_delete_task_markdown() {
        let (mut store, settings, mut vault) = setup();
        let task = store.add_task("Doomed").unwrap();
        let mut sync = coordinator();
        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p1");
        assert!(vault.exists("Work/Tasks/Doomed.md"));

        sync.delete_task_markdown(&store, &settings, &mut vault, "Doomed", "p1");
        assert!(!vault.exists("Work/Tasks/Doomed.md"));
        // Absent note: no-op
        sync.delete_task_markdown(&store, &settings, &mut vault, "Doomed", "p1");
    }

    #[test]
    fn test_markdown_to_task_inserts_into_store() {
        let (mut store, settings, mut vault) = setup();
        let mut sync = coordinator();
        vault.seed(
            "Work/Tasks/Imported.md",
            "---\nid: task-ext\ntitle: Imported\nstatus: In Progress\ncompleted: false\n---\n",
        );

        let applied =
            sync.sync_markdown_to_task(&mut store, &settings, &mut vault, "Work/Tasks/Imported.md", "p1");
        assert!(applied);
        let task = store.get_task("task-ext").unwrap();
        assert_eq!(task.title, "Imported");
        assert_eq!(task.status, "In Progress");
    }

    #[test]
    fn test_markdown_to_task_parse_failure_is_noop() {
        let (mut store, settings, mut vault) = setup();
        let mut sync = coordinator();
        vault.seed("Work/Tasks/Junk.md", "no header at all\n");

        let applied =
            sync.sync_markdown_to_task(&mut store, &settings, &mut vault, "Work/Tasks/Junk.md", "p1");
        assert!(!applied);
        assert_eq!(store.all_tasks().count(), 0);
    }

    #[test]
    fn test_markdown_title_change_renames_backing_note() {
        let (mut store, settings, mut vault) = setup();
        let mut sync = coordinator();

        let mut task = crate::model::task::Task::new("task-1", "Old title", "Not Started");
        task.created_date = Some("2026-01-01".into());
        store.add_task_from_object(task, "p1").unwrap();
        store.take_events();

        // The note at the old path carries a hand-edited new title
        vault.seed(
            "Work/Tasks/Old title.md",
            "---\nid: task-1\ntitle: New title\nstatus: Not Started\ncompleted: false\n---\n",
        );

        let applied = sync.sync_markdown_to_task(
            &mut store,
            &settings,
            &mut vault,
            "Work/Tasks/Old title.md",
            "p1",
        );
        assert!(applied);
        assert!(vault.exists("Work/Tasks/New title.md"));
        assert!(!vault.exists("Work/Tasks/Old title.md"));
        assert_eq!(store.get_task("task-1").unwrap().title, "New title");
    }

    #[test]
    fn test_reentrancy_guard_drops_second_call() {
        let (mut store, settings, mut vault) = setup();
        let mut sync = coordinator();
        vault.seed(
            "Work/Tasks/Busy.md",
            "---\nid: task-busy\ntitle: Busy\nstatus: Not Started\ncompleted: false\n---\n",
        );

        // First "in-flight" invocation holds the lock
        assert!(sync.busy().try_acquire("Work/Tasks/Busy.md"));
        let applied = sync.sync_markdown_to_task(
            &mut store,
            &settings,
            &mut vault,
            "Work/Tasks/Busy.md",
            "p1",
        );
        assert!(!applied, "concurrent call for a busy path must be dropped");
        assert!(store.get_task("task-busy").is_none());

        sync.busy().release("Work/Tasks/Busy.md");
        let applied = sync.sync_markdown_to_task(
            &mut store,
            &settings,
            &mut vault,
            "Work/Tasks/Busy.md",
            "p1",
        );
        assert!(applied);
        assert!(store.get_task("task-busy").is_some());
    }

    #[test]
    fn test_initial_sync_reads_folder_and_stamps_settings() {
        let (mut store, mut settings, mut vault) = setup();
        let mut sync = coordinator();
        vault.seed(
            "Work/Tasks/A.md",
            "---\nid: task-a\ntitle: A\nstatus: Not Started\ncompleted: false\n---\n",
        );
        vault.seed(
            "Work/Tasks/B.md",
            "---\nid: task-b\ntitle: B\nstatus: Not Started\ncompleted: true\n---\n",
        );
        vault.seed("Work/Tasks/junk.md", "not a task note\n");
        vault.seed("Elsewhere/C.md", "---\nid: task-c\ntitle: C\n---\n");

        let mut saves = 0;
        let applied = sync.initial_sync(
            &mut store,
            &mut settings,
            &mut vault,
            "p1",
            10_000_000,
            |_| saves += 1,
        );
        assert_eq!(applied, 2);
        assert_eq!(saves, 1);
        assert_eq!(settings.sync.get("p1"), Some(&10_000_000));
        assert!(store.get_task("task-a").is_some());
        assert!(store.get_task("task-b").is_some());
        assert!(store.get_task("task-c").is_none());
    }

    #[test]
    fn test_initial_sync_freshness_gate() {
        let (mut store, mut settings, mut vault) = setup();
        let mut sync = coordinator();
        vault.seed(
            "Work/Tasks/A.md",
            "---\nid: task-a\ntitle: A\nstatus: Not Started\ncompleted: false\n---\n",
        );

        let t0 = 10_000_000i64;
        assert_eq!(
            sync.initial_sync(&mut store, &mut settings, &mut vault, "p1", t0, |_| {}),
            1
        );
        // Within the recency window: skipped entirely
        assert_eq!(
            sync.initial_sync(
                &mut store,
                &mut settings,
                &mut vault,
                "p1",
                t0 + SYNC_RECENCY_MS - 1,
                |_| {}
            ),
            0
        );
        // Past the window: runs again
        assert_eq!(
            sync.initial_sync(
                &mut store,
                &mut settings,
                &mut vault,
                "p1",
                t0 + SYNC_RECENCY_MS,
                |_| {}
            ),
            1
        );
    }

    #[test]
    fn test_initial_sync_missing_folder_is_noop() {
        let (mut store, mut settings, mut vault) = setup();
        let mut sync = coordinator();
        let applied =
            sync.initial_sync(&mut store, &mut settings, &mut vault, "p1", 1_000, |_| {});
        assert_eq!(applied, 0);
        // No timestamp recorded for a pass that never ran
        assert!(settings.sync.get("p1").is_none());
    }

    #[test]
    fn test_process_events_mirrors_store_changes() {
        let (mut store, settings, mut vault) = setup();
        let mut sync = coordinator();

        let task = store.add_task("Tracked").unwrap();
        sync.process_events(&mut store, &settings, &mut vault);
        assert!(vault.exists("Work/Tasks/Tracked.md"));

        store
            .update_task(
                &task.id,
                TaskPatch {
                    title: Some("Tracked again".into()),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        sync.process_events(&mut store, &settings, &mut vault);
        assert!(!vault.exists("Work/Tasks/Tracked.md"));
        assert!(vault.exists("Work/Tasks/Tracked again.md"));

        store.delete_task(&task.id).unwrap();
        sync.process_events(&mut store, &settings, &mut vault);
        assert!(!vault.exists("Work/Tasks/Tracked again.md"));
    }

    #[test]
    fn test_sanitized_titles_round_trip_through_paths() {
        let (mut store, settings, mut vault) = setup();
        let mut sync = coordinator();
        let task = store.add_task("Fix: a/b").unwrap();
        sync.sync_task_to_markdown(&store, &settings, &mut vault, &task.id, "p1");
        assert!(vault.exists("Work/Tasks/Fix- a-b.md"));
    }

    #[test]
    fn test_project_for_path() {
        let (mut store, settings, _) = setup();
        store.add_project("p2", "Side");
        assert_eq!(
            project_for_path(&store, &settings, "Work/Tasks/A.md"),
            Some("p1".to_string())
        );
        assert_eq!(
            project_for_path(&store, &settings, "Side/Tasks/B.md"),
            Some("p2".to_string())
        );
        assert_eq!(project_for_path(&store, &settings, "Daily/today.md"), None);
    }
}
