use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Maximum size of the sync log before inline trimming (256 KB).
const MAX_LOG_SIZE: u64 = 262_144;

/// Entries older than this are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

/// Self-documenting header written at the top of a new sync log.
const FILE_HEADER: &str = "\
<!-- plannote sync log — append-only record of skipped or degraded
     sync steps. If a note was not written or read, the reason is here.
     View with: pn log. Safe to delete if stale. -->

---
";

/// What kind of step degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCategory {
    Parse,
    Write,
    Rename,
    Delete,
    Scan,
}

impl fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncCategory::Parse => write!(f, "parse"),
            SyncCategory::Write => write!(f, "write"),
            SyncCategory::Rename => write!(f, "rename"),
            SyncCategory::Delete => write!(f, "delete"),
            SyncCategory::Scan => write!(f, "scan"),
        }
    }
}

impl SyncCategory {
    fn parse_category(s: &str) -> Option<Self> {
        match s {
            "parse" => Some(SyncCategory::Parse),
            "write" => Some(SyncCategory::Write),
            "rename" => Some(SyncCategory::Rename),
            "delete" => Some(SyncCategory::Delete),
            "scan" => Some(SyncCategory::Scan),
            _ => None,
        }
    }
}

/// One logged degradation.
#[derive(Debug, Clone)]
pub struct SyncLogEntry {
    pub timestamp: DateTime<Utc>,
    pub category: SyncCategory,
    /// The document or project the step concerned.
    pub context: String,
    /// What went wrong, usually the underlying error text.
    pub detail: String,
}

impl SyncLogEntry {
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} — {}: {}\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.context,
        );
        if !self.detail.is_empty() {
            out.push('\n');
            out.push_str(&self.detail);
            if !self.detail.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str("\n---\n");
        out
    }
}

/// Handle for recording degradations. With no directory configured the
/// log is a sink, which is what in-memory embeddings want.
#[derive(Debug, Clone, Default)]
pub struct SyncLog {
    dir: Option<PathBuf>,
}

impl SyncLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SyncLog {
            dir: Some(dir.into()),
        }
    }

    /// A log that drops everything.
    pub fn disabled() -> Self {
        SyncLog::default()
    }

    /// Append an entry. Errors writing the log itself are swallowed and
    /// printed to stderr; a failing log must never fail a sync.
    pub fn record(&self, category: SyncCategory, context: &str, detail: &str) {
        let Some(ref dir) = self.dir else {
            return;
        };
        let entry = SyncLogEntry {
            timestamp: Utc::now(),
            category,
            context: context.to_string(),
            detail: detail.to_string(),
        };
        if let Err(e) = append_entry(dir, &entry) {
            eprintln!("warning: could not write to sync log: {}", e);
        }
    }
}

/// Return the path to the sync log file.
pub fn sync_log_path(dir: &Path) -> PathBuf {
    dir.join("sync.log")
}

fn append_entry(dir: &Path, entry: &SyncLogEntry) -> io::Result<()> {
    let path = sync_log_path(dir);

    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        try_inline_trim(&path);
    }

    let needs_header = !path.exists() || std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;
    Ok(())
}

/// Drop entries past the prune age when the log outgrows its cap.
/// Uses a non-blocking flock so a concurrent writer just skips the trim.
fn try_inline_trim(path: &Path) {
    let file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(_) => return,
    };

    let fd = {
        use std::os::unix::io::AsRawFd;
        file.as_raw_fd()
    };
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if ret != 0 {
        return;
    }

    let mut content = String::new();
    let mut reader = io::BufReader::new(&file);
    if reader.read_to_string(&mut content).is_err() {
        return;
    }

    let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
    let trimmed = drop_entries_before(&content, &cutoff);
    if trimmed.len() < content.len()
        && let Ok(mut f) = File::create(path)
    {
        let _ = f.write_all(trimmed.as_bytes());
    }
    // Lock released on drop
}

/// Read entries from the log, oldest first.
pub fn read_entries(dir: &Path) -> Vec<SyncLogEntry> {
    let content = match std::fs::read_to_string(sync_log_path(dir)) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    parse_entries(&content)
}

/// Remove entries, all of them or only those past the prune age.
/// Returns the number removed.
pub fn prune(dir: &Path, all: bool) -> io::Result<usize> {
    let path = sync_log_path(dir);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(&path)?;
    let before = parse_entries(&content).len();

    let remaining = if all {
        FILE_HEADER.to_string()
    } else {
        let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
        drop_entries_before(&content, &cutoff)
    };
    let after = parse_entries(&remaining).len();
    std::fs::write(&path, remaining)?;
    Ok(before - after)
}

fn parse_entries(content: &str) -> Vec<SyncLogEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(header) = line.strip_prefix("## ") else {
            continue;
        };
        let Some((timestamp, category, context)) = parse_entry_header(header) else {
            continue;
        };

        let mut detail = String::new();
        for line in lines.by_ref() {
            if line == "---" || line.starts_with("## ") {
                break;
            }
            if line.trim().is_empty() && detail.is_empty() {
                continue;
            }
            if !detail.is_empty() {
                detail.push('\n');
            }
            detail.push_str(line);
        }

        entries.push(SyncLogEntry {
            timestamp,
            category,
            context: context.to_string(),
            detail: detail.trim_end().to_string(),
        });
    }
    entries
}

/// Parse an entry header: `<timestamp> — <category>: <context>`
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, SyncCategory, &str)> {
    let dash = header.find(" — ")?;
    let timestamp = DateTime::parse_from_rfc3339(&header[..dash])
        .ok()?
        .with_timezone(&Utc);
    let rest = &header[dash + " — ".len()..];
    let colon = rest.find(": ")?;
    let category = SyncCategory::parse_category(&rest[..colon])?;
    Some((timestamp, category, &rest[colon + 2..]))
}

/// Remove entries older than `cutoff`, keeping the file header.
fn drop_entries_before(content: &str, cutoff: &DateTime<Utc>) -> String {
    let mut result = String::new();
    let mut current = String::new();
    let mut current_ts: Option<DateTime<Utc>> = None;
    let mut in_header = true;

    let mut flush = |current: &mut String, ts: Option<DateTime<Utc>>, result: &mut String| {
        if let Some(ts) = ts
            && ts >= *cutoff
        {
            result.push_str(current);
        }
        current.clear();
    };

    for line in content.lines() {
        if in_header {
            result.push_str(line);
            result.push('\n');
            if line == "---" {
                in_header = false;
            }
            continue;
        }
        if let Some(stripped) = line.strip_prefix("## ") {
            flush(&mut current, current_ts, &mut result);
            current_ts = parse_entry_header(stripped).map(|(ts, _, _)| ts);
        }
        current.push_str(line);
        current.push('\n');
    }
    flush(&mut current, current_ts, &mut result);
    result
}
