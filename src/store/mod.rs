use chrono::Local;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::project::{OptionItem, Project};
use crate::model::task::{normalize_title, Subtask, Task, TaskPatch};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("no active project")]
    NoActiveProject,
    #[error("setting parent {parent} on {task} would create a cycle")]
    WouldCycle { task: String, parent: String },
}

/// A change the store recorded, drained by whoever drives syncing.
/// Poll-style stand-in for the host's change subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TaskAdded {
        project_id: String,
        task_id: String,
    },
    TaskUpdated {
        project_id: String,
        task_id: String,
    },
    /// Title changed — the backing note needs a rename, not just a rewrite.
    TaskRenamed {
        project_id: String,
        task_id: String,
        old_title: String,
    },
    TaskDeleted {
        project_id: String,
        task_id: String,
        title: String,
    },
}

/// The authoritative task collection: ordered projects, each owning
/// ordered tasks and its option sets.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskStore {
    pub projects: IndexMap<String, Project>,
    #[serde(default)]
    pub active_project: Option<String>,
    #[serde(skip)]
    events: Vec<StoreEvent>,
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore::default()
    }

    /// Drain recorded change events.
    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Add a project. The first project added becomes active.
    pub fn add_project(&mut self, id: impl Into<String>, name: impl Into<String>) -> &Project {
        let id = id.into();
        let project = Project::new(id.clone(), name);
        self.projects.insert(id.clone(), project);
        if self.active_project.is_none() {
            self.active_project = Some(id.clone());
        }
        &self.projects[&id]
    }

    /// Delete a project. The last remaining project may never be deleted
    /// (no-op). Deleting the active project moves the active pointer to
    /// the first remaining project. Returns whether a project was removed.
    pub fn delete_project(&mut self, id: &str) -> bool {
        if self.projects.len() <= 1 || !self.projects.contains_key(id) {
            return false;
        }
        self.projects.shift_remove(id);
        if self.active_project.as_deref() == Some(id) {
            self.active_project = self.projects.keys().next().cloned();
        }
        true
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.get_mut(id)
    }

    /// Look up a project by display name, case-insensitively.
    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn active(&self) -> Option<&Project> {
        self.active_project
            .as_deref()
            .and_then(|id| self.projects.get(id))
    }

    // -----------------------------------------------------------------------
    // Option sets
    // -----------------------------------------------------------------------

    /// Remove a status option. The final entry may not be deleted (no-op).
    pub fn remove_status_option(&mut self, project_id: &str, option_id: &str) -> bool {
        let Some(project) = self.projects.get_mut(project_id) else {
            return false;
        };
        remove_option_with_floor(&mut project.statuses, option_id)
    }

    /// Remove a priority option. The final entry may not be deleted (no-op).
    pub fn remove_priority_option(&mut self, project_id: &str, option_id: &str) -> bool {
        let Some(project) = self.projects.get_mut(project_id) else {
            return false;
        };
        remove_option_with_floor(&mut project.priorities, option_id)
    }

    /// Remove a tag definition. Tags carry no deletion floor.
    pub fn remove_tag_option(&mut self, project_id: &str, option_id: &str) -> bool {
        let Some(project) = self.projects.get_mut(project_id) else {
            return false;
        };
        let before = project.tags.len();
        project.tags.retain(|t| t.id != option_id);
        project.tags.len() != before
    }

    pub fn add_tag_option(&mut self, project_id: &str, name: &str, color: &str) -> Option<String> {
        let project = self.projects.get_mut(project_id)?;
        let id = format!("tag-{}", uuid::Uuid::new_v4());
        project.tags.push(OptionItem::new(id.clone(), name, color));
        Some(id)
    }

    // -----------------------------------------------------------------------
    // Task lookup
    // -----------------------------------------------------------------------

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.projects.values().find_map(|p| p.tasks.get(task_id))
    }

    /// The id of the project owning the given task.
    pub fn project_of(&self, task_id: &str) -> Option<&str> {
        self.projects
            .values()
            .find(|p| p.tasks.contains_key(task_id))
            .map(|p| p.id.as_str())
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.projects.values().flat_map(|p| p.tasks.values())
    }

    // -----------------------------------------------------------------------
    // Task CRUD
    // -----------------------------------------------------------------------

    /// Create a task in the active project with default fields.
    pub fn add_task(&mut self, title: &str) -> Result<Task, StoreError> {
        let project_id = self
            .active_project
            .clone()
            .ok_or(StoreError::NoActiveProject)?;
        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or(StoreError::NoActiveProject)?;

        let mut task = Task::new(
            format!("task-{}", uuid::Uuid::new_v4()),
            title,
            project.default_status().to_string(),
        );
        task.created_date = Some(today_str());

        project.tasks.insert(task.id.clone(), task.clone());
        self.events.push(StoreEvent::TaskAdded {
            project_id,
            task_id: task.id.clone(),
        });
        Ok(task)
    }

    /// Insert a task into a specific project (scan imports use this).
    pub fn add_task_to_project(&mut self, task: Task, project_id: &str) -> Result<(), StoreError> {
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;
        let task_id = task.id.clone();
        project.tasks.insert(task_id.clone(), task);
        self.events.push(StoreEvent::TaskAdded {
            project_id: project_id.to_string(),
            task_id,
        });
        Ok(())
    }

    /// Insert-or-replace by id. A replacement identical to what is stored
    /// records no event, so a faithful markdown re-read settles instead
    /// of ping-ponging with the note writer.
    pub fn add_task_from_object(&mut self, task: Task, project_id: &str) -> Result<(), StoreError> {
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;
        let task_id = task.id.clone();

        match project.tasks.get(&task_id) {
            Some(existing) if *existing == task => {}
            Some(_) => {
                project.tasks.insert(task_id.clone(), task);
                self.events.push(StoreEvent::TaskUpdated {
                    project_id: project_id.to_string(),
                    task_id,
                });
            }
            None => {
                project.tasks.insert(task_id.clone(), task);
                self.events.push(StoreEvent::TaskAdded {
                    project_id: project_id.to_string(),
                    task_id,
                });
            }
        }
        Ok(())
    }

    /// Apply a partial update and stamp the modification date.
    pub fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> Result<(), StoreError> {
        let project_id = self
            .project_of(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?
            .to_string();
        let task = self
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.tasks.get_mut(task_id))
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;

        let mut old_title = None;
        if let Some(title) = patch.title {
            let title = normalize_title(&title);
            if title != task.title {
                old_title = Some(std::mem::replace(&mut task.title, title));
            }
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(subtasks) = patch.subtasks {
            task.subtasks = subtasks;
        }
        if let Some(dependencies) = patch.dependencies {
            task.dependencies = dependencies;
        }
        if let Some(links) = patch.links {
            task.links = links;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(bucket_id) = patch.bucket_id {
            task.bucket_id = bucket_id;
        }
        if let Some(start_date) = patch.start_date {
            task.start_date = start_date;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        task.last_modified_date = Some(today_str());

        match old_title {
            Some(old_title) => self.events.push(StoreEvent::TaskRenamed {
                project_id,
                task_id: task_id.to_string(),
                old_title,
            }),
            None => self.events.push(StoreEvent::TaskUpdated {
                project_id,
                task_id: task_id.to_string(),
            }),
        }
        Ok(())
    }

    /// Toggle completion independently of status.
    pub fn toggle_complete(&mut self, task_id: &str) -> Result<bool, StoreError> {
        let completed = !self
            .get_task(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?
            .completed;
        self.update_task(
            task_id,
            TaskPatch {
                completed: Some(completed),
                ..TaskPatch::default()
            },
        )?;
        Ok(completed)
    }

    /// Append a subtask to a task.
    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Result<String, StoreError> {
        let project_id = self
            .project_of(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?
            .to_string();
        let task = self
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.tasks.get_mut(task_id))
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;

        let sub_id = format!("sub-{}", uuid::Uuid::new_v4());
        task.subtasks.push(Subtask {
            id: sub_id.clone(),
            title: normalize_title(title),
            completed: false,
        });
        task.last_modified_date = Some(today_str());
        self.events.push(StoreEvent::TaskUpdated {
            project_id,
            task_id: task_id.to_string(),
        });
        Ok(sub_id)
    }

    /// Delete a task. Dependents' dangling references are left in place.
    pub fn delete_task(&mut self, task_id: &str) -> Result<(), StoreError> {
        let project_id = self
            .project_of(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?
            .to_string();
        let task = self
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.tasks.shift_remove(task_id))
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;

        self.events.push(StoreEvent::TaskDeleted {
            project_id,
            task_id: task_id.to_string(),
            title: task.title,
        });
        Ok(())
    }

    /// Re-parent a task. Rejects any assignment that would make the task
    /// its own ancestor.
    pub fn set_parent(
        &mut self,
        task_id: &str,
        parent_id: Option<String>,
    ) -> Result<(), StoreError> {
        let project_id = self
            .project_of(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?
            .to_string();

        if let Some(ref parent) = parent_id {
            let project = &self.projects[&project_id];
            // Walk up from the proposed parent looking for task_id
            let mut cursor = Some(parent.clone());
            while let Some(current) = cursor {
                if current == task_id {
                    return Err(StoreError::WouldCycle {
                        task: task_id.to_string(),
                        parent: parent.clone(),
                    });
                }
                cursor = project
                    .tasks
                    .get(&current)
                    .and_then(|t| t.parent_id.clone());
            }
        }

        let task = self
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.tasks.get_mut(task_id))
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        task.parent_id = parent_id;
        task.last_modified_date = Some(today_str());
        self.events.push(StoreEvent::TaskUpdated {
            project_id,
            task_id: task_id.to_string(),
        });
        Ok(())
    }

    /// Reorder a project's tasks to the given id sequence. Ids not listed
    /// keep their relative order after the listed ones.
    pub fn set_order(&mut self, project_id: &str, ids: &[String]) -> Result<(), StoreError> {
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;

        let mut reordered = IndexMap::new();
        for id in ids {
            if let Some(task) = project.tasks.shift_remove(id) {
                reordered.insert(id.clone(), task);
            }
        }
        for (id, task) in project.tasks.drain(..) {
            reordered.insert(id, task);
        }
        project.tasks = reordered;
        Ok(())
    }
}

/// Remove an option entry unless it is the last one (deletion floor).
fn remove_option_with_floor(options: &mut Vec<OptionItem>, option_id: &str) -> bool {
    if options.len() <= 1 {
        return false;
    }
    let before = options.len();
    options.retain(|o| o.id != option_id);
    options.len() != before
}

/// Today as an ISO `YYYY-MM-DD` string.
pub fn today_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}
