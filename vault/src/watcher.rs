//! Watching a vault directory for markdown changes.

use std::path::{Component, Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{Result, VaultError};
use crate::event::{VaultEvent, VaultEventKind};
use crate::path::is_markdown;

/// Capacity of the event channel.
const EVENT_BUFFER: usize = 1000;

/// Forwards changes to markdown documents under a vault root.
pub struct VaultWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    event_tx: mpsc::Sender<VaultEvent>,
}

impl VaultWatcher {
    /// Create a watcher for `root` and the receiver its events arrive on.
    pub fn new(root: impl AsRef<Path>) -> Result<(Self, mpsc::Receiver<VaultEvent>)> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .map_err(|_| VaultError::RootNotFound(root.display().to_string()))?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let watcher = Self {
            root,
            watcher: None,
            event_tx,
        };
        Ok((watcher, event_rx))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching. Calling this while running does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let event_tx = self.event_tx.clone();
        let root = self.root.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let kind = VaultEventKind::from(event.kind);
                    for path in &event.paths {
                        let Some(vault_event) = vault_event(&root, kind, path) else {
                            continue;
                        };
                        if let Err(e) = event_tx.blocking_send(vault_event) {
                            error!("Failed to send vault event: {e}");
                        }
                    }
                }
                Err(e) => error!("Watch error: {e}"),
            },
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        self.watcher = Some(watcher);
        info!("Watching vault at {}", self.root.display());
        Ok(())
    }

    /// Stop watching.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.root);
            info!("Stopped watching vault at {}", self.root.display());
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

/// Turn a raw filesystem path into a vault event, if it names a visible
/// markdown document under `root`.
fn vault_event(root: &Path, kind: VaultEventKind, path: &Path) -> Option<VaultEvent> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        let part = part.to_str()?;
        if part.starts_with('.') {
            return None;
        }
        parts.push(part);
    }

    let path = parts.join("/");
    if !is_markdown(&path) {
        return None;
    }
    debug!("Vault change {kind:?}: {path}");
    Some(VaultEvent::new(kind, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_vault_event_filtering() {
        let root = Path::new("/vault");

        let event = vault_event(root, VaultEventKind::Modified, Path::new("/vault/notes/a.md"));
        assert_eq!(event.map(|e| e.path), Some("notes/a.md".to_string()));

        assert!(vault_event(root, VaultEventKind::Modified, Path::new("/vault/a.txt")).is_none());
        assert!(
            vault_event(root, VaultEventKind::Modified, Path::new("/vault/.bibgraph/x.md")).is_none()
        );
        assert!(vault_event(root, VaultEventKind::Modified, Path::new("/elsewhere/a.md")).is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, _events) = VaultWatcher::new(temp_dir.path()).unwrap();
        assert!(!watcher.is_running());

        watcher.start().unwrap();
        assert!(watcher.is_running());
        watcher.start().unwrap();

        watcher.stop();
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            VaultWatcher::new("/nonexistent/vault/12345"),
            Err(VaultError::RootNotFound(_))
        ));
    }
}
