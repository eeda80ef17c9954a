pub mod coordinator;
pub mod debounce;
pub mod locations;
pub mod paths;
pub mod scanner;

pub use coordinator::{project_for_path, BusyKeys, SyncCoordinator, SYNC_RECENCY_MS};
pub use debounce::{Debouncer, SCAN_DEBOUNCE};
pub use locations::LocationMap;
pub use paths::{sanitize_title, task_file_path, tasks_folder};
pub use scanner::{NoteScanner, ScanStats};
