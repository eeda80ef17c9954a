use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::cli::commands::*;
use crate::io::synclog::{self, SyncLog};
use crate::io::vault::FsVault;
use crate::io::watcher::{VaultEvent, VaultWatcher};
use crate::io::workspace::{self, WorkspaceError};
use crate::model::settings::Settings;
use crate::store::TaskStore;
use crate::sync::coordinator::{project_for_path, SyncCoordinator};
use crate::sync::debounce::{Debouncer, SCAN_DEBOUNCE};
use crate::sync::locations::LocationMap;
use crate::sync::scanner::NoteScanner;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs: the vault root and the loaded state.
struct Workspace {
    root: PathBuf,
    dir: PathBuf,
    settings: Settings,
    store: TaskStore,
}

impl Workspace {
    fn open(vault_dir: Option<&str>) -> Result<Self, WorkspaceError> {
        let start = match vault_dir {
            Some(dir) => std::fs::canonicalize(dir)?,
            None => std::env::current_dir()?,
        };
        let root = workspace::discover_vault(&start)?;
        let dir = workspace::workspace_dir(&root);
        let settings = workspace::load_settings(&dir)?;
        let store = workspace::load_store(&dir)?;
        Ok(Workspace {
            root,
            dir,
            settings,
            store,
        })
    }

    fn save_store(&self) -> Result<(), WorkspaceError> {
        workspace::save_store(&self.dir, &self.store)
    }

    fn sync_log(&self) -> SyncLog {
        SyncLog::new(&self.dir)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CliResult {
    match cli.command {
        // Init runs before workspace discovery
        Commands::Init(args) => cmd_init(args, cli.vault_dir.as_deref()),
        Commands::Sync(args) => cmd_sync(args, cli.vault_dir.as_deref()),
        Commands::Scan => cmd_scan(cli.vault_dir.as_deref()),
        Commands::Watch => cmd_watch(cli.vault_dir.as_deref()),
        Commands::Tasks(args) => cmd_tasks(args, cli.vault_dir.as_deref()),
        Commands::Add(args) => cmd_add(args, cli.vault_dir.as_deref()),
        Commands::Log(args) => cmd_log(args, cli.vault_dir.as_deref()),
    }
}

fn resolve_project_id(store: &TaskStore, name_or_id: &str) -> Option<String> {
    if store.project(name_or_id).is_some() {
        return Some(name_or_id.to_string());
    }
    store.project_by_name(name_or_id).map(|p| p.id.clone())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(args: InitArgs, vault_dir: Option<&str>) -> CliResult {
    let root = match vault_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Tasks".to_string())
    });
    workspace::init_workspace(&root, &name, args.force)?;
    println!("initialized plannote workspace with project '{}'", name);
    Ok(())
}

fn cmd_sync(args: SyncArgs, vault_dir: Option<&str>) -> CliResult {
    let mut ws = Workspace::open(vault_dir)?;
    let mut vault = FsVault::new(&ws.root);
    let mut sync = SyncCoordinator::new(ws.sync_log());

    let project_ids: Vec<String> = match &args.project {
        Some(name) => vec![
            resolve_project_id(&ws.store, name)
                .ok_or_else(|| format!("no such project: {}", name))?,
        ],
        None => ws.store.projects.keys().cloned().collect(),
    };

    let now_ms = Utc::now().timestamp_millis();
    let dir = ws.dir.clone();
    let mut total = 0;
    for project_id in &project_ids {
        if args.force {
            ws.settings.sync.remove(project_id);
        }
        total += sync.initial_sync(
            &mut ws.store,
            &mut ws.settings,
            &mut vault,
            project_id,
            now_ms,
            |settings| {
                if let Err(e) = workspace::save_settings(&dir, settings) {
                    eprintln!("warning: could not save settings: {}", e);
                }
            },
        );
    }
    ws.save_store()?;
    println!("synced {} note(s) across {} project(s)", total, project_ids.len());
    Ok(())
}

fn cmd_scan(vault_dir: Option<&str>) -> CliResult {
    let mut ws = Workspace::open(vault_dir)?;
    let mut vault = FsVault::new(&ws.root);
    let locations = LocationMap::load(&workspace::locations_path(&ws.dir));
    let mut scanner = NoteScanner::new(&ws.settings, locations, ws.sync_log());
    let mut sync = SyncCoordinator::new(ws.sync_log());

    let stats = scanner.scan_all_notes(&mut ws.store, &vault);
    // Mirror everything the scan changed back out as task notes
    sync.process_events(&mut ws.store, &ws.settings, &mut vault);

    scanner.locations().save(&workspace::locations_path(&ws.dir))?;
    ws.save_store()?;
    println!(
        "imported {} task(s) ({} new, {} updated)",
        stats.total(),
        stats.created,
        stats.updated
    );
    Ok(())
}

fn cmd_watch(vault_dir: Option<&str>) -> CliResult {
    let mut ws = Workspace::open(vault_dir)?;
    let mut vault = FsVault::new(&ws.root);
    let locations = LocationMap::load(&workspace::locations_path(&ws.dir));
    let mut scanner = NoteScanner::new(&ws.settings, locations, ws.sync_log());
    let mut sync = SyncCoordinator::new(ws.sync_log());

    let watcher = VaultWatcher::start(&ws.root)?;
    let mut debounce = Debouncer::new(SCAN_DEBOUNCE);
    println!("watching {} (ctrl-c to stop)", ws.root.display());

    loop {
        for event in watcher.poll() {
            let VaultEvent::Changed(paths) = event;
            let now = Instant::now();
            for path in paths {
                debounce.note_change(&path, now);
            }
        }

        let due = debounce.due(Instant::now());
        if !due.is_empty() {
            scanner.begin_pass();
            for path in &due {
                match project_for_path(&ws.store, &ws.settings, path) {
                    // A task note changed: read it back into the store
                    Some(project_id) => {
                        if sync.sync_markdown_to_task(
                            &mut ws.store,
                            &ws.settings,
                            &mut vault,
                            path,
                            &project_id,
                        ) {
                            println!("synced {}", path);
                        }
                    }
                    // Anything else is a candidate daily note
                    None => {
                        let stats = scanner.scan_file(&mut ws.store, &vault, path);
                        if stats.total() > 0 {
                            println!(
                                "scanned {} ({} new, {} updated)",
                                path, stats.created, stats.updated
                            );
                        }
                    }
                }
            }
            sync.process_events(&mut ws.store, &ws.settings, &mut vault);
            if let Err(e) = scanner.locations().save(&workspace::locations_path(&ws.dir)) {
                eprintln!("warning: could not save locations: {}", e);
            }
            if let Err(e) = ws.save_store() {
                eprintln!("warning: could not save store: {}", e);
            }
        }

        std::thread::sleep(Duration::from_millis(250));
    }
}

fn cmd_tasks(args: TasksArgs, vault_dir: Option<&str>) -> CliResult {
    let ws = Workspace::open(vault_dir)?;

    let filter = match &args.project {
        Some(name) => Some(
            resolve_project_id(&ws.store, name)
                .ok_or_else(|| format!("no such project: {}", name))?,
        ),
        None => None,
    };

    for project in ws.store.projects.values() {
        if let Some(ref id) = filter
            && project.id != *id
        {
            continue;
        }
        println!("{} ({} tasks)", project.name, project.tasks.len());
        for task in project.tasks.values() {
            let mark = if task.completed { 'x' } else { ' ' };
            let mut line = format!("  [{}] {}  ({})", mark, task.title, task.status);
            if let Some(ref priority) = task.priority {
                line.push_str(&format!(" [{}]", priority));
            }
            if let Some(ref due) = task.due_date {
                line.push_str(&format!(" due {}", due));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_add(args: AddArgs, vault_dir: Option<&str>) -> CliResult {
    let mut ws = Workspace::open(vault_dir)?;
    let mut vault = FsVault::new(&ws.root);
    let mut sync = SyncCoordinator::new(ws.sync_log());

    let task = ws.store.add_task(&args.title)?;
    sync.process_events(&mut ws.store, &ws.settings, &mut vault);
    ws.save_store()?;
    println!("added {} ({})", task.title, task.id);
    Ok(())
}

fn cmd_log(args: LogArgs, vault_dir: Option<&str>) -> CliResult {
    let ws = Workspace::open(vault_dir)?;
    if args.prune {
        let removed = synclog::prune(&ws.dir, args.all)?;
        println!("pruned {} entries", removed);
        return Ok(());
    }

    let entries = synclog::read_entries(&ws.dir);
    if entries.is_empty() {
        println!("sync log is empty");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.category,
            entry.context
        );
        if !entry.detail.is_empty() {
            for line in entry.detail.lines() {
                println!("    {}", line);
            }
        }
    }
    Ok(())
}
