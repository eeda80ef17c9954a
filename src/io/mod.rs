pub mod synclog;
pub mod vault;
pub mod watcher;
pub mod workspace;

pub use synclog::{SyncCategory, SyncLog};
pub use vault::{FsVault, MemVault, Vault};
pub use watcher::{VaultEvent, VaultWatcher};
pub use workspace::WorkspaceError;
