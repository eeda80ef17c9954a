use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The document-store seam: the host's file primitives, addressed by
/// vault-relative paths with `/` separators.
///
/// Mirrors what a note-taking host exposes: read, create, modify,
/// delete, rename, folder creation, and markdown enumeration.
pub trait Vault {
    fn read(&self, path: &str) -> io::Result<String>;
    /// Create a new document. Fails if one already exists at `path`.
    fn create(&mut self, path: &str, content: &str) -> io::Result<()>;
    /// Overwrite an existing document. Fails if none exists at `path`.
    fn modify(&mut self, path: &str, content: &str) -> io::Result<()>;
    fn remove(&mut self, path: &str) -> io::Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;
    fn exists(&self, path: &str) -> bool;
    fn is_folder(&self, path: &str) -> bool;
    /// Create a folder, parents included. Existing folders are fine.
    fn create_folder(&mut self, path: &str) -> io::Result<()>;
    /// Every markdown document in the vault, in stable order.
    fn markdown_files(&self) -> Vec<String>;
}

fn already_exists(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("document already exists: {}", path),
    )
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no document at: {}", path))
}

// ---------------------------------------------------------------------------
// Filesystem vault
// ---------------------------------------------------------------------------

/// A vault rooted at a directory on disk. Writes are atomic
/// (temp file + rename). Dot-directories are invisible to enumeration.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsVault { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn collect_markdown(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_markdown(root, &path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some("md")
            && let Ok(rel) = path.strip_prefix(root)
        {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

impl Vault for FsVault {
    fn read(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(self.full(path))
    }

    fn create(&mut self, path: &str, content: &str) -> io::Result<()> {
        let full = self.full(path);
        if full.exists() {
            return Err(already_exists(path));
        }
        atomic_write(&full, content.as_bytes())
    }

    fn modify(&mut self, path: &str, content: &str) -> io::Result<()> {
        let full = self.full(path);
        if !full.exists() {
            return Err(not_found(path));
        }
        atomic_write(&full, content.as_bytes())
    }

    fn remove(&mut self, path: &str) -> io::Result<()> {
        fs::remove_file(self.full(path))
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let target = self.full(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.full(from), target)
    }

    fn exists(&self, path: &str) -> bool {
        self.full(path).exists()
    }

    fn is_folder(&self, path: &str) -> bool {
        self.full(path).is_dir()
    }

    fn create_folder(&mut self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.full(path))
    }

    fn markdown_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_markdown(&self.root, &self.root, &mut out);
        out
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    use std::io::Write;
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory vault
// ---------------------------------------------------------------------------

/// An in-memory vault for tests and embedding hosts that manage their
/// own persistence.
#[derive(Debug, Default)]
pub struct MemVault {
    files: BTreeMap<String, String>,
    folders: BTreeSet<String>,
}

impl MemVault {
    pub fn new() -> Self {
        MemVault::default()
    }

    /// Seed a document, creating parent folders implicitly.
    pub fn seed(&mut self, path: &str, content: &str) {
        self.add_parent_folders(path);
        self.files.insert(path.to_string(), content.to_string());
    }

    fn add_parent_folders(&mut self, path: &str) {
        let parts: Vec<&str> = path.split('/').collect();
        let mut prefix = String::new();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            self.folders.insert(prefix.clone());
        }
    }
}

impl Vault for MemVault {
    fn read(&self, path: &str) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn create(&mut self, path: &str, content: &str) -> io::Result<()> {
        if self.files.contains_key(path) {
            return Err(already_exists(path));
        }
        self.seed(path, content);
        Ok(())
    }

    fn modify(&mut self, path: &str, content: &str) -> io::Result<()> {
        match self.files.get_mut(path) {
            Some(existing) => {
                *existing = content.to_string();
                Ok(())
            }
            None => Err(not_found(path)),
        }
    }

    fn remove(&mut self, path: &str) -> io::Result<()> {
        self.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let content = self.files.remove(from).ok_or_else(|| not_found(from))?;
        self.seed(to, &content);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.folders.contains(path)
    }

    fn is_folder(&self, path: &str) -> bool {
        self.folders.contains(path)
    }

    fn create_folder(&mut self, path: &str) -> io::Result<()> {
        let mut prefix = String::new();
        for part in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            self.folders.insert(prefix.clone());
        }
        Ok(())
    }

    fn markdown_files(&self) -> Vec<String> {
        self.files
            .keys()
            .filter(|p| p.ends_with(".md"))
            .cloned()
            .collect()
    }
}
