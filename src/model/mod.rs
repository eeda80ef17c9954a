pub mod project;
pub mod settings;
pub mod task;

pub use project::{Bucket, OptionItem, Project};
pub use settings::Settings;
pub use task::{DepKind, Dependency, LinkKind, Subtask, Task, TaskLink, TaskPatch};
