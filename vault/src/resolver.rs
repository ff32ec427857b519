//! Opening, and optionally creating, the reference note for a citekey.

use tracing::{debug, info};

use crate::error::Result;
use crate::path::{parent, reference_path};
use crate::storage::{Vault, Workspace};

/// Outcome of resolving a citekey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The note existed and was opened.
    Opened(String),

    /// The note was created from the template and opened.
    Created(String),

    /// The note is missing and auto-creation is off. Nothing was opened.
    NotFound(String),

    /// A folder sits at the note's path. Nothing was created or opened.
    Occupied(String),
}

impl Resolution {
    /// Vault path of the reference note.
    pub fn path(&self) -> &str {
        match self {
            Self::Opened(path)
            | Self::Created(path)
            | Self::NotFound(path)
            | Self::Occupied(path) => path,
        }
    }
}

/// Initial content of an auto-created reference note.
pub fn note_template(citekey: &str) -> String {
    [
        "---".to_string(),
        format!("citekey: \"{citekey}\""),
        "---".to_string(),
        String::new(),
        format!("# {citekey}"),
        String::new(),
        "> Reference note auto-created by BibLaTeX Graph plugin.".to_string(),
        String::new(),
    ]
    .join("\n")
}

/// Finds the reference note for a citekey and opens it.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    reference_folder: String,
    auto_create_note: bool,
}

impl ReferenceResolver {
    pub fn new(reference_folder: impl Into<String>, auto_create_note: bool) -> Self {
        Self {
            reference_folder: reference_folder.into(),
            auto_create_note,
        }
    }

    /// Open the note for `citekey`, creating it first if allowed.
    ///
    /// A missing note with auto-creation off produces a notice and
    /// [`Resolution::NotFound`]. A folder at the note's path is left alone.
    /// Creation failures are returned and nothing is opened.
    pub async fn resolve(
        &self,
        citekey: &str,
        vault: &dyn Vault,
        workspace: &dyn Workspace,
    ) -> Result<Resolution> {
        let path = reference_path(&self.reference_folder, citekey);

        match vault.entry(&path).await {
            Some(entry) if entry.is_file() => {
                debug!("Opening reference note {path}");
                workspace.open_file(&path).await?;
                return Ok(Resolution::Opened(path));
            }
            Some(_) => {
                debug!("Folder at reference note path {path}, ignoring");
                return Ok(Resolution::Occupied(path));
            }
            None => {}
        }

        if !self.auto_create_note {
            workspace.notice(&format!("Reference note not found: {path}"));
            return Ok(Resolution::NotFound(path));
        }

        if let Some(folder) = parent(&path)
            && vault.entry(folder).await.is_none()
        {
            vault.create_folder(folder).await?;
        }
        vault.create(&path, &note_template(citekey)).await?;

        info!("Created reference note {path}");
        workspace.notice(&format!("Created reference note: {path}"));
        workspace.open_file(&path).await?;
        Ok(Resolution::Created(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::storage::{MemoryVault, RecordingWorkspace};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_note_template() {
        assert_eq!(
            note_template("doe2020"),
            "---\ncitekey: \"doe2020\"\n---\n\n# doe2020\n\n> Reference note auto-created by BibLaTeX Graph plugin.\n"
        );
    }

    #[tokio::test]
    async fn test_existing_note_is_opened() {
        let vault = MemoryVault::new().with_file("refs/doe2020.md", "# doe");
        let workspace = RecordingWorkspace::new();
        let resolver = ReferenceResolver::new("refs", false);

        let resolution = resolver.resolve("doe2020", &vault, &workspace).await.unwrap();
        assert_eq!(resolution, Resolution::Opened("refs/doe2020.md".into()));
        assert_eq!(workspace.opened(), vec!["refs/doe2020.md".to_string()]);
        assert!(workspace.notices().is_empty());
    }

    #[tokio::test]
    async fn test_missing_note_without_auto_create() {
        let vault = MemoryVault::new();
        let workspace = RecordingWorkspace::new();
        let resolver = ReferenceResolver::new("refs", false);

        let resolution = resolver.resolve("doe2020", &vault, &workspace).await.unwrap();
        assert_eq!(resolution, Resolution::NotFound("refs/doe2020.md".into()));
        assert_eq!(
            workspace.notices(),
            vec!["Reference note not found: refs/doe2020.md".to_string()]
        );
        assert!(workspace.opened().is_empty());
        assert_eq!(vault.entry("refs").await, None);
        assert_eq!(vault.content("refs/doe2020.md").await, None);
    }

    #[tokio::test]
    async fn test_missing_note_is_created() {
        let vault = MemoryVault::new();
        let workspace = RecordingWorkspace::new();
        let resolver = ReferenceResolver::new("refs/", true);

        let resolution = resolver.resolve("doe2020", &vault, &workspace).await.unwrap();
        assert_eq!(resolution, Resolution::Created("refs/doe2020.md".into()));
        assert_eq!(
            vault.content("refs/doe2020.md").await,
            Some(note_template("doe2020"))
        );
        assert_eq!(
            workspace.notices(),
            vec!["Created reference note: refs/doe2020.md".to_string()]
        );
        assert_eq!(workspace.opened(), vec!["refs/doe2020.md".to_string()]);

        // A second activation opens the existing note.
        let again = resolver.resolve("doe2020", &vault, &workspace).await.unwrap();
        assert_eq!(again, Resolution::Opened("refs/doe2020.md".into()));
    }

    #[tokio::test]
    async fn test_creation_failure_opens_nothing() {
        // A file where the reference folder should be.
        let vault = MemoryVault::new().with_file("refs", "not a folder");
        let workspace = RecordingWorkspace::new();
        let resolver = ReferenceResolver::new("refs", true);

        let result = resolver.resolve("doe2020", &vault, &workspace).await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
        assert!(workspace.opened().is_empty());
        assert!(workspace.notices().is_empty());
    }

    #[tokio::test]
    async fn test_folder_at_note_path_is_left_alone() {
        let vault = MemoryVault::new().with_file("refs/doe2020.md/inner.md", "");
        let workspace = RecordingWorkspace::new();
        let resolver = ReferenceResolver::new("refs", true);

        let resolution = resolver.resolve("doe2020", &vault, &workspace).await.unwrap();
        assert_eq!(resolution, Resolution::Occupied("refs/doe2020.md".into()));
        assert!(workspace.opened().is_empty());
        assert!(workspace.notices().is_empty());
        assert_eq!(vault.content("refs/doe2020.md").await, None);
    }
}
