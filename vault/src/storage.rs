//! Vault storage and workspace seams.
//!
//! The [`Vault`] trait is the document store the core reads notes from and
//! creates reference notes in. [`Workspace`] is the user-facing side: opening
//! documents and showing notices. [`FsVault`] keeps a vault in a directory
//! on disk; [`MemoryVault`] keeps one in memory.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, VaultError};
use crate::path::{is_markdown, normalize_path, parent};

/// Something that exists at a vault path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    File(String),
    Folder(String),
}

impl VaultEntry {
    pub fn path(&self) -> &str {
        match self {
            Self::File(path) | Self::Folder(path) => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Document storage.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Paths of every markdown document, sorted.
    async fn markdown_files(&self) -> Result<Vec<String>>;

    /// Read a document, possibly from a cache.
    async fn cached_read(&self, path: &str) -> Result<String>;

    /// Look up what exists at `path`.
    async fn entry(&self, path: &str) -> Option<VaultEntry>;

    /// Create a folder and any missing ancestors.
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Create a new document. Fails if something already exists at `path`
    /// or the parent folder is missing.
    async fn create(&self, path: &str, content: &str) -> Result<()>;
}

/// The user-facing host.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Open a document for the user.
    async fn open_file(&self, path: &str) -> Result<()>;

    /// Show a transient message.
    fn notice(&self, message: &str);
}

#[derive(Debug, Clone)]
struct CachedFile {
    modified: SystemTime,
    content: String,
}

/// A vault backed by a directory.
///
/// Hidden files and folders (names starting with `.`) are not part of the
/// vault.
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    cache: RwLock<HashMap<String, CachedFile>>,
}

impl FsVault {
    /// Open the vault rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(VaultError::RootNotFound(root.display().to_string()));
        }

        info!("Opened vault at {}", root.display());
        Ok(Self {
            root,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a vault path.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let normalized = normalize_path(path);
        if normalized == "/" {
            return Ok(self.root.clone());
        }

        let relative = Path::new(&normalized);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Vault path of a filesystem location inside the vault.
    pub fn vault_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(normalize_path(&parts.join("/")))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

#[async_trait]
impl Vault for FsVault {
    async fn markdown_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker.filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(path) = self.vault_path(entry.path())
                && is_markdown(&path)
            {
                files.push(path);
            }
        }

        files.sort();
        debug!("Found {} markdown files", files.len());
        Ok(files)
    }

    async fn cached_read(&self, path: &str) -> Result<String> {
        let key = normalize_path(path);
        let full = self.resolve(&key)?;
        let modified = fs::metadata(&full).await?.modified()?;

        if let Some(cached) = self.cache.read().await.get(&key)
            && cached.modified == modified
        {
            return Ok(cached.content.clone());
        }

        let content = fs::read_to_string(&full).await?;
        self.cache.write().await.insert(
            key,
            CachedFile {
                modified,
                content: content.clone(),
            },
        );
        Ok(content)
    }

    async fn entry(&self, path: &str) -> Option<VaultEntry> {
        let normalized = normalize_path(path);
        let full = self.resolve(&normalized).ok()?;
        let metadata = fs::metadata(&full).await.ok()?;

        if metadata.is_file() {
            Some(VaultEntry::File(normalized))
        } else if metadata.is_dir() {
            Some(VaultEntry::Folder(normalized))
        } else {
            None
        }
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if fs::try_exists(&full).await? {
            return Err(VaultError::AlreadyExists(normalize_path(path)));
        }

        fs::create_dir_all(&full).await?;
        debug!("Created folder {}", full.display());
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<()> {
        let normalized = normalize_path(path);
        let full = self.resolve(&normalized)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => VaultError::AlreadyExists(normalized.clone()),
                ErrorKind::NotFound => VaultError::NotFound(
                    parent(&normalized).unwrap_or("/").to_string(),
                ),
                _ => VaultError::Io(e),
            })?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        debug!("Created file {}", full.display());
        Ok(())
    }
}

/// A vault held in memory.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: RwLock<BTreeMap<String, String>>,
    folders: RwLock<BTreeSet<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, creating its folders.
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        let path = normalize_path(path);
        add_ancestors(self.folders.get_mut(), &path);
        self.files.get_mut().insert(path, content.into());
        self
    }

    /// Replace or add a document, creating its folders.
    pub async fn write(&self, path: &str, content: impl Into<String>) {
        let path = normalize_path(path);
        add_ancestors(&mut *self.folders.write().await, &path);
        self.files.write().await.insert(path, content.into());
    }

    /// Remove a document.
    pub async fn remove(&self, path: &str) -> Option<String> {
        self.files.write().await.remove(&normalize_path(path))
    }

    /// Content of a document, if present.
    pub async fn content(&self, path: &str) -> Option<String> {
        self.files.read().await.get(&normalize_path(path)).cloned()
    }
}

fn add_ancestors(folders: &mut BTreeSet<String>, path: &str) {
    let mut current = parent(path);
    while let Some(folder) = current {
        if !folders.insert(folder.to_string()) {
            break;
        }
        current = parent(folder);
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn markdown_files(&self) -> Result<Vec<String>> {
        Ok(self
            .files
            .read()
            .await
            .keys()
            .filter(|path| is_markdown(path))
            .cloned()
            .collect())
    }

    async fn cached_read(&self, path: &str) -> Result<String> {
        let path = normalize_path(path);
        self.files
            .read()
            .await
            .get(&path)
            .cloned()
            .ok_or(VaultError::NotFound(path))
    }

    async fn entry(&self, path: &str) -> Option<VaultEntry> {
        let path = normalize_path(path);
        if self.files.read().await.contains_key(&path) {
            Some(VaultEntry::File(path))
        } else if self.folders.read().await.contains(&path) {
            Some(VaultEntry::Folder(path))
        } else {
            None
        }
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        if self.entry(&path).await.is_some() {
            return Err(VaultError::AlreadyExists(path));
        }

        let mut folders = self.folders.write().await;
        add_ancestors(&mut folders, &path);
        folders.insert(path);
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<()> {
        let path = normalize_path(path);
        if self.entry(&path).await.is_some() {
            return Err(VaultError::AlreadyExists(path));
        }
        if let Some(folder) = parent(&path)
            && !self.folders.read().await.contains(folder)
        {
            return Err(VaultError::NotFound(folder.to_string()));
        }

        self.files.write().await.insert(path, content.to_string());
        Ok(())
    }
}

/// A workspace that records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingWorkspace {
    opened: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Notices shown so far, in order.
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Workspace for RecordingWorkspace {
    async fn open_file(&self, path: &str) -> Result<()> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(path.to_string());
        }
        Ok(())
    }

    fn notice(&self, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fs_vault() -> (TempDir, FsVault) {
        let temp_dir = TempDir::new().unwrap();
        let vault = FsVault::new(temp_dir.path()).unwrap();
        (temp_dir, vault)
    }

    #[tokio::test]
    async fn test_fs_vault_lists_markdown() {
        let (temp_dir, vault) = fs_vault();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("notes/deep")).unwrap();
        std::fs::create_dir_all(root.join(".bibgraph")).unwrap();
        std::fs::write(root.join("index.md"), "# Index").unwrap();
        std::fs::write(root.join("notes/deep/a.md"), "@doe").unwrap();
        std::fs::write(root.join("notes/b.txt"), "@doe").unwrap();
        std::fs::write(root.join(".bibgraph/hidden.md"), "").unwrap();

        assert_eq!(
            vault.markdown_files().await.unwrap(),
            vec!["index.md".to_string(), "notes/deep/a.md".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fs_vault_read_and_cache() {
        let (temp_dir, vault) = fs_vault();
        std::fs::write(temp_dir.path().join("a.md"), "first").unwrap();

        assert_eq!(vault.cached_read("a.md").await.unwrap(), "first");
        assert_eq!(vault.cached_read("/a.md").await.unwrap(), "first");
        assert!(matches!(
            vault.cached_read("missing.md").await,
            Err(VaultError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_vault_create() {
        let (temp_dir, vault) = fs_vault();

        assert!(matches!(
            vault.create("refs/doe.md", "x").await,
            Err(VaultError::NotFound(folder)) if folder == "refs"
        ));

        vault.create_folder("refs").await.unwrap();
        assert_eq!(vault.entry("refs").await, Some(VaultEntry::Folder("refs".into())));
        assert!(matches!(
            vault.create_folder("refs").await,
            Err(VaultError::AlreadyExists(_))
        ));

        vault.create("refs/doe.md", "hello").await.unwrap();
        assert_eq!(
            vault.entry("refs//doe.md").await,
            Some(VaultEntry::File("refs/doe.md".into()))
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("refs/doe.md")).unwrap(),
            "hello"
        );
        assert!(matches!(
            vault.create("refs/doe.md", "again").await,
            Err(VaultError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_vault_rejects_escaping_paths() {
        let (_temp_dir, vault) = fs_vault();
        assert!(matches!(
            vault.resolve("../outside.md"),
            Err(VaultError::InvalidPath(_))
        ));
        assert_eq!(vault.entry("../outside.md").await, None);
    }

    #[test]
    fn test_fs_vault_missing_root() {
        assert!(matches!(
            FsVault::new("/nonexistent/vault/12345"),
            Err(VaultError::RootNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_vault() {
        let vault = MemoryVault::new()
            .with_file("notes/a.md", "@doe")
            .with_file("data.json", "{}");

        assert_eq!(vault.markdown_files().await.unwrap(), vec!["notes/a.md".to_string()]);
        assert_eq!(vault.entry("notes").await, Some(VaultEntry::Folder("notes".into())));
        assert_eq!(vault.cached_read("notes/a.md").await.unwrap(), "@doe");

        assert!(matches!(
            vault.create("refs/doe.md", "").await,
            Err(VaultError::NotFound(_))
        ));
        vault.create_folder("refs").await.unwrap();
        vault.create("refs/doe.md", "note").await.unwrap();
        assert_eq!(vault.content("refs/doe.md").await.as_deref(), Some("note"));
    }

    #[tokio::test]
    async fn test_recording_workspace() {
        let workspace = RecordingWorkspace::new();
        workspace.open_file("a.md").await.unwrap();
        workspace.notice("hello");

        assert_eq!(workspace.opened(), vec!["a.md".to_string()]);
        assert_eq!(workspace.notices(), vec!["hello".to_string()]);
    }
}
