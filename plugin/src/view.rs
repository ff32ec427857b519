//! Live citation highlighting for one open editor.

use std::ops::Range;
use std::sync::Arc;

use bibgraph_citations::{CitationPattern, Highlight, LiveDecorator, Refresh, ViewUpdate};
use tokio::sync::watch;
use tracing::debug;

/// Highlights citations in an editable document and follows settings
/// changes.
#[derive(Debug)]
pub struct CitationView {
    decorator: LiveDecorator,
    patterns: watch::Receiver<Arc<CitationPattern>>,
}

impl CitationView {
    pub(crate) fn new(mut patterns: watch::Receiver<Arc<CitationPattern>>) -> Self {
        let pattern = patterns.borrow_and_update().clone();
        Self {
            decorator: LiveDecorator::new(pattern),
            patterns,
        }
    }

    /// Full scan when the view is first shown.
    pub fn attach(&mut self, doc: &str, viewport: &Range<usize>) {
        self.follow_pattern();
        self.decorator.attach(doc, viewport);
    }

    /// Bring highlights up to date after a document or viewport change.
    pub fn update(&mut self, update: ViewUpdate<'_>) -> Refresh {
        self.follow_pattern();
        self.decorator.update(update)
    }

    /// Current highlight ranges.
    pub fn highlights(&self) -> &[Highlight] {
        self.decorator.highlights()
    }

    fn follow_pattern(&mut self) {
        if self.patterns.has_changed().unwrap_or(false) {
            let pattern = self.patterns.borrow_and_update().clone();
            debug!("Citation view picked up prefix {:?}", pattern.prefix());
            self.decorator.reconfigure(pattern);
        }
    }
}
