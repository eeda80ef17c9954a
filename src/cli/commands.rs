use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pn", about = concat!("[#] plannote v", env!("CARGO_PKG_VERSION"), " - tasks in plain notes"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "vault-dir", global = true)]
    pub vault_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a plannote workspace in the current directory
    Init(InitArgs),
    /// Read every task note of a project (or all projects) into the store
    Sync(SyncArgs),
    /// Scan daily notes for tagged checklist lines
    Scan,
    /// Watch the vault and sync/scan on changes
    Watch,
    /// List tasks
    Tasks(TasksArgs),
    /// Add a task to the active project (and write its note)
    Add(AddArgs),
    /// View or prune the sync log
    Log(LogArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Name of the first project (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if .plannote/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Project name or id (default: every project)
    pub project: Option<String>,
    /// Sync even when the last sync is recent
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct TasksArgs {
    /// Project name or id (default: every project)
    pub project: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
}

#[derive(Args)]
pub struct LogArgs {
    /// Remove logged entries instead of printing them
    #[arg(long)]
    pub prune: bool,
    /// With --prune: remove everything, not just old entries
    #[arg(long)]
    pub all: bool,
}
