//! Plugin settings and their persistence.

use std::path::{Path, PathBuf};

use bibgraph_vault::ProjectionPolicy;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{PluginError, Result};

/// Citation prefix used when none is configured.
pub const DEFAULT_CITATION_PREFIX: &str = "@";

/// Reference folder used when none is configured.
pub const DEFAULT_REFERENCE_FOLDER: &str = "references";

/// User configuration.
///
/// Missing keys fall back to their defaults and unknown keys are ignored, so
/// older and newer settings files both load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Marker written before a citekey, e.g. `@` in `@doe2020`.
    pub citation_prefix: String,

    /// Vault folder holding one reference note per citekey.
    pub reference_folder: String,

    /// Create missing reference notes when a citation is activated.
    pub auto_create_note: bool,

    /// How projection passes combine with existing link counts.
    pub projection_policy: ProjectionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            citation_prefix: DEFAULT_CITATION_PREFIX.to_string(),
            reference_folder: DEFAULT_REFERENCE_FOLDER.to_string(),
            auto_create_note: true,
            projection_policy: ProjectionPolicy::default(),
        }
    }
}

impl Settings {
    /// Replace empty strings with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.citation_prefix.is_empty() {
            self.citation_prefix = DEFAULT_CITATION_PREFIX.to_string();
        }
        if self.reference_folder.is_empty() {
            self.reference_folder = DEFAULT_REFERENCE_FOLDER.to_string();
        }
        self
    }
}

/// Settings persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store settings at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional location inside a vault: `.bibgraph/data.json`.
    pub fn in_vault(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(".bibgraph").join("data.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, merging stored values over the defaults.
    ///
    /// A missing file yields the defaults.
    pub async fn load(&self) -> Result<Settings> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", self.path.display());
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| PluginError::Settings(format!("{}: {e}", self.path.display())))?;
        Ok(settings.normalized())
    }

    /// Save settings atomically.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(settings)?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
