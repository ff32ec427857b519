//! The plugin controller.
//!
//! [`BiblatexGraph`] owns the settings and the compiled citation pattern and
//! routes host signals to the citation components:
//!
//! - rendered fragments go through [`BiblatexGraph::post_process`]
//! - editors get a [`CitationView`] from [`BiblatexGraph::citation_view`]
//! - [`HostSignal`]s trigger link projection and reference resolution
//!
//! Marker activations arrive synchronously, so they are forwarded as
//! [`HostSignal::CitationActivated`] over the signal channel and resolved
//! when the host's loop handles them.

use std::sync::Arc;

use bibgraph_citations::{ActivateHandler, CitationError, CitationPattern, Fragment, annotate};
use bibgraph_vault::{
    LinkProjector, ProjectionPolicy, ProjectionReport, ReferenceResolver, Resolution,
    SharedLinkIndex, Vault, Workspace,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::settings::{Settings, SettingsStore};
use crate::view::CitationView;

/// Capacity of the host signal channel.
const SIGNAL_BUFFER: usize = 64;

/// Notifications from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostSignal {
    /// The host finished its initial layout.
    LayoutReady,

    /// The host finished resolving document links.
    MetadataResolved,

    /// A citation marker was activated.
    CitationActivated { citekey: String },
}

/// Controller tying settings, rendering hooks and the link index together.
pub struct BiblatexGraph {
    settings: RwLock<Settings>,
    store: Option<SettingsStore>,

    /// Current pattern; views subscribe to changes.
    pattern_tx: watch::Sender<Arc<CitationPattern>>,

    vault: Arc<dyn Vault>,
    workspace: Arc<dyn Workspace>,
    links: SharedLinkIndex,

    /// Held for a whole projection pass.
    projector: Mutex<LinkProjector>,

    signal_tx: mpsc::Sender<HostSignal>,
}

impl BiblatexGraph {
    /// Create a controller and the receiver for its host signals.
    pub fn new(
        settings: Settings,
        vault: Arc<dyn Vault>,
        workspace: Arc<dyn Workspace>,
        links: SharedLinkIndex,
    ) -> Result<(Self, mpsc::Receiver<HostSignal>)> {
        let settings = settings.normalized();
        let pattern = compile(&settings.citation_prefix)?;
        let (pattern_tx, _) = watch::channel(pattern);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);

        let controller = Self {
            projector: Mutex::new(LinkProjector::new(settings.projection_policy)),
            settings: RwLock::new(settings),
            store: None,
            pattern_tx,
            vault,
            workspace,
            links,
            signal_tx,
        };
        Ok((controller, signal_rx))
    }

    /// Load settings from `store` and create a controller that persists
    /// every settings change back to it.
    pub async fn load(
        store: SettingsStore,
        vault: Arc<dyn Vault>,
        workspace: Arc<dyn Workspace>,
        links: SharedLinkIndex,
    ) -> Result<(Self, mpsc::Receiver<HostSignal>)> {
        let settings = store.load().await?;
        info!("Loaded settings from {}", store.path().display());

        let (mut controller, signal_rx) = Self::new(settings, vault, workspace, links)?;
        controller.store = Some(store);
        Ok((controller, signal_rx))
    }

    /// A snapshot of the current settings.
    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// The current citation pattern.
    pub fn pattern(&self) -> Arc<CitationPattern> {
        self.pattern_tx.borrow().clone()
    }

    pub fn links(&self) -> &SharedLinkIndex {
        &self.links
    }

    /// A sender for host signals.
    pub fn signal_sender(&self) -> mpsc::Sender<HostSignal> {
        self.signal_tx.clone()
    }

    /// Set the citation prefix. An empty prefix resets it to the default.
    pub async fn set_citation_prefix(&self, prefix: &str) -> Result<()> {
        self.update_settings(|s| s.citation_prefix = prefix.to_string())
            .await
    }

    /// Set the reference folder. An empty folder resets it to the default.
    pub async fn set_reference_folder(&self, folder: &str) -> Result<()> {
        self.update_settings(|s| s.reference_folder = folder.to_string())
            .await
    }

    pub async fn set_auto_create_note(&self, enabled: bool) -> Result<()> {
        self.update_settings(|s| s.auto_create_note = enabled).await
    }

    pub async fn set_projection_policy(&self, policy: ProjectionPolicy) -> Result<()> {
        self.update_settings(|s| s.projection_policy = policy).await
    }

    async fn update_settings(&self, apply: impl FnOnce(&mut Settings) + Send) -> Result<()> {
        let settings = {
            let mut guard = self.settings.write().await;
            apply(&mut *guard);
            *guard = guard.clone().normalized();
            guard.clone()
        };

        self.recompile(&settings.citation_prefix)?;
        self.projector
            .lock()
            .await
            .set_policy(settings.projection_policy);

        if let Some(store) = &self.store {
            store.save(&settings).await?;
        }
        Ok(())
    }

    /// Rebuild the pattern from `prefix` and publish it to open views.
    fn recompile(&self, prefix: &str) -> Result<()> {
        if self.pattern_tx.borrow().prefix() == prefix {
            return Ok(());
        }
        let pattern = compile(prefix)?;
        self.pattern_tx.send_replace(pattern);
        debug!("Recompiled citation pattern for prefix {prefix:?}");
        Ok(())
    }

    /// Replace citations in a rendered fragment with interactive markers.
    ///
    /// Activating a marker sends [`HostSignal::CitationActivated`]. Returns
    /// the number of markers created.
    pub fn post_process(&self, fragment: &mut Fragment) -> usize {
        let signal_tx = self.signal_tx.clone();
        let on_activate: ActivateHandler = Arc::new(move |citekey: &str| {
            let signal = HostSignal::CitationActivated {
                citekey: citekey.to_string(),
            };
            if let Err(e) = signal_tx.try_send(signal) {
                warn!("Dropped citation activation: {e}");
            }
        });
        annotate(fragment, &self.pattern(), &on_activate)
    }

    /// Create a live highlighter for an editor.
    pub fn citation_view(&self) -> CitationView {
        CitationView::new(self.pattern_tx.subscribe())
    }

    /// Run one link projection pass over the whole vault.
    ///
    /// Passes are serialised: a pass started while another runs waits for
    /// it to finish.
    pub async fn project(&self) -> Result<ProjectionReport> {
        let mut projector = self.projector.lock().await;
        let folder = self.settings.read().await.reference_folder.clone();
        let report = projector
            .project(self.vault.as_ref(), &self.links, &self.pattern(), &folder)
            .await?;
        Ok(report)
    }

    /// Open (or create) the reference note for `citekey`.
    pub async fn resolve(&self, citekey: &str) -> Result<Resolution> {
        let resolver = {
            let settings = self.settings.read().await;
            ReferenceResolver::new(settings.reference_folder.clone(), settings.auto_create_note)
        };
        let resolution = resolver
            .resolve(citekey, self.vault.as_ref(), self.workspace.as_ref())
            .await?;
        Ok(resolution)
    }

    /// Handle one host signal.
    pub async fn handle_signal(&self, signal: HostSignal) -> Result<()> {
        match signal {
            HostSignal::LayoutReady | HostSignal::MetadataResolved => {
                debug!("Projecting citation links after {signal:?}");
                self.project().await?;
            }
            HostSignal::CitationActivated { citekey } => {
                debug!("Resolving citation {citekey}");
                self.resolve(&citekey).await?;
            }
        }
        Ok(())
    }

    /// Handle a signal, logging failures instead of returning them.
    pub async fn dispatch(&self, signal: HostSignal) {
        if let Err(e) = self.handle_signal(signal).await {
            error!("Failed to handle host signal: {e}");
        }
    }
}

fn compile(prefix: &str) -> Result<Arc<CitationPattern>> {
    let pattern = CitationPattern::compile(prefix).map_err(CitationError::from)?;
    Ok(Arc::new(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibgraph_citations::{Activation, Node};
    use bibgraph_vault::{LinkIndex, MemoryVault, RecordingWorkspace};
    use pretty_assertions::assert_eq;

    fn controller(vault: MemoryVault) -> (BiblatexGraph, mpsc::Receiver<HostSignal>) {
        BiblatexGraph::new(
            Settings::default(),
            Arc::new(vault),
            Arc::new(RecordingWorkspace::new()),
            LinkIndex::new().shared(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_setters_coerce_empty_values() {
        let (graph, _signals) = controller(MemoryVault::new());

        graph.set_citation_prefix("").await.unwrap();
        graph.set_reference_folder("").await.unwrap();

        let settings = graph.settings().await;
        assert_eq!(settings.citation_prefix, "@");
        assert_eq!(settings.reference_folder, "references");
        assert_eq!(graph.pattern().prefix(), "@");
    }

    #[tokio::test]
    async fn test_prefix_change_recompiles() {
        let (graph, _signals) = controller(MemoryVault::new());
        graph.set_citation_prefix("#").await.unwrap();
        assert_eq!(graph.pattern().prefix(), "#");

        let mut fragment = Fragment::new(vec![Node::text("@old #new")]);
        assert_eq!(graph.post_process(&mut fragment), 1);
        assert_eq!(fragment.markers()[0].citekey, "new");
    }

    #[tokio::test]
    async fn test_marker_activation_sends_signal() {
        let (graph, mut signals) = controller(MemoryVault::new());
        let mut fragment = Fragment::new(vec![Node::text("see [@doe2020, p. 4]")]);
        graph.post_process(&mut fragment);

        let mut event = Activation::new();
        fragment.markers()[0].activate(&mut event);

        assert!(event.default_prevented());
        assert_eq!(
            signals.try_recv().unwrap(),
            HostSignal::CitationActivated {
                citekey: "doe2020".to_string()
            }
        );
    }

    #[test]
    fn test_signal_serialization() {
        let json = serde_json::to_string(&HostSignal::CitationActivated {
            citekey: "doe".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"citation_activated","citekey":"doe"}"#);
    }
}
