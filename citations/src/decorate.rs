//! Incremental citation highlighting for live editors.
//!
//! A [`LiveDecorator`] keeps the highlight ranges of every citation that
//! starts inside the editor's viewport. After the first full scan, updates
//! only rescan the neighbourhood of an edit:
//!
//! ```text
//!   old:  ..[hl]....[hl]..|== edit ==|..[hl]...[hl]..
//!                         cf         ct
//!   new:  ..[hl]..p~~~~~~~~~~~~~~~~~~~~~~~[hl]  <- resync
//!         kept    rescanned from p        mapped tail kept
//! ```
//!
//! A match attempt at position `s` never reads past the first `]` at or after
//! `s` (bracketed form), nor past the end of the citekey run following the
//! prefix (bare form). The rescan therefore starts at the earliest position
//! whose attempt could have read edited text. It stops as soon as a fresh
//! match past the edit coincides with a mapped old highlight, because from
//! there on both scans see the same text. The result is always identical to
//! a full scan of the viewport.

use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::pattern::{CitationPattern, is_citekey_char};

/// CSS class hosts use for live citation highlights.
pub const HIGHLIGHT_CLASS: &str = "cm-biblatex-citekey";

/// Edits spanning more bytes than this trigger a full viewport rescan.
pub const MAX_INCREMENTAL_SPAN: usize = 1000;

/// Byte range of a highlighted citation in the live document.
pub type Highlight = Range<usize>;

/// A text edit: replace a byte range of the old document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Byte range in the old document to replace.
    pub range: Range<usize>,
    /// Replacement text.
    pub replacement: String,
}

impl TextEdit {
    pub fn new(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::new(range, "")
    }
}

/// Which side of an insertion a mapped position sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// Stay before text inserted exactly at the position.
    Before,
    /// Move past text inserted exactly at the position.
    After,
}

/// A set of non-overlapping edits, all in old-document coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    edits: Vec<TextEdit>,
}

impl ChangeSet {
    /// Build a change set. Edits are sorted by start offset and must not
    /// overlap.
    pub fn new(mut edits: Vec<TextEdit>) -> Self {
        edits.sort_by_key(|e| (e.range.start, e.range.end));
        debug_assert!(
            edits.windows(2).all(|w| w[0].range.end <= w[1].range.start),
            "overlapping edits"
        );
        Self { edits }
    }

    /// A change set holding one edit.
    pub fn single(edit: TextEdit) -> Self {
        Self { edits: vec![edit] }
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    /// Apply the edits to `old`, producing the new document.
    pub fn apply(&self, old: &str) -> String {
        let mut out = String::with_capacity(old.len());
        let mut last = 0;
        for edit in &self.edits {
            out.push_str(&old[last..edit.range.start]);
            out.push_str(&edit.replacement);
            last = edit.range.end;
        }
        out.push_str(&old[last..]);
        out
    }

    /// Map an old-document position into the new document.
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        let mut removed = 0;
        let mut inserted = 0;

        for edit in &self.edits {
            if edit.range.start > pos {
                break;
            }
            if edit.range.is_empty() && edit.range.start == pos && assoc == Assoc::Before {
                break;
            }
            if edit.range.end <= pos {
                removed += edit.range.len();
                inserted += edit.replacement.len();
                continue;
            }
            // `pos` lies inside a replaced range.
            let start = edit.range.start - removed + inserted;
            return match assoc {
                Assoc::Before => start,
                Assoc::After => start + edit.replacement.len(),
            };
        }

        pos - removed + inserted
    }

    /// Length of the new document given the old length.
    fn new_len(&self, old_len: usize) -> Option<usize> {
        let removed: usize = self.edits.iter().map(|e| e.range.len()).sum();
        let inserted: usize = self.edits.iter().map(|e| e.replacement.len()).sum();
        (old_len + inserted).checked_sub(removed)
    }

    /// Region of the new document covered by the edits.
    pub fn touched_range(&self) -> Option<Range<usize>> {
        self.envelope().map(|(_, new)| new)
    }

    /// The touched region as `(old range, new range)`.
    fn envelope(&self) -> Option<(Range<usize>, Range<usize>)> {
        let first = self.edits.first()?;
        let last = self.edits.last()?;
        let old = first.range.start..last.range.end;
        let new_end = self.map_pos(last.range.end, Assoc::After);
        Some((old, first.range.start..new_end))
    }
}

/// What an update did to the highlight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Nothing changed.
    Unchanged,
    /// Only the edited neighbourhood was rescanned.
    Incremental,
    /// The whole viewport was rescanned.
    Full,
}

/// A document update delivered to the decorator.
#[derive(Debug, Clone, Copy)]
pub struct ViewUpdate<'a> {
    /// The document after the changes.
    pub doc: &'a str,
    /// Changes from the previous document to `doc`.
    pub changes: &'a ChangeSet,
    /// Viewport in `doc` coordinates.
    pub viewport: &'a Range<usize>,
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Initialized {
        doc_len: usize,
        viewport: Range<usize>,
        highlights: Vec<Highlight>,
    },
}

/// Maintains citation highlights over an editable document.
#[derive(Debug)]
pub struct LiveDecorator {
    pattern: Arc<CitationPattern>,
    state: State,
    stale: bool,
}

impl LiveDecorator {
    /// Create an uninitialized decorator.
    pub fn new(pattern: Arc<CitationPattern>) -> Self {
        Self {
            pattern,
            state: State::Uninitialized,
            stale: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Initialized { .. })
    }

    pub fn pattern(&self) -> &Arc<CitationPattern> {
        &self.pattern
    }

    /// Current highlights, sorted and non-overlapping.
    pub fn highlights(&self) -> &[Highlight] {
        match &self.state {
            State::Uninitialized => &[],
            State::Initialized { highlights, .. } => highlights,
        }
    }

    /// Swap in a new pattern. The next update rescans the viewport.
    pub fn reconfigure(&mut self, pattern: Arc<CitationPattern>) {
        self.pattern = pattern;
        self.stale = true;
    }

    /// Full scan of `doc` when the decorator is first attached to a view.
    pub fn attach(&mut self, doc: &str, viewport: &Range<usize>) {
        let viewport = clamp_viewport(doc, viewport);
        let highlights = full_scan(&self.pattern, doc, &viewport);
        trace!(
            "Attached decorator: {} highlights in {viewport:?}",
            highlights.len()
        );
        self.state = State::Initialized {
            doc_len: doc.len(),
            viewport,
            highlights,
        };
        self.stale = false;
    }

    /// Bring the highlights up to date with `update`.
    pub fn update(&mut self, update: ViewUpdate<'_>) -> Refresh {
        let refreshed = match &self.state {
            State::Uninitialized => None,
            _ if self.stale => None,
            State::Initialized {
                doc_len,
                viewport,
                highlights,
            } => self.try_incremental(*doc_len, viewport, highlights, update),
        };

        match refreshed {
            Some((Refresh::Unchanged, _)) => Refresh::Unchanged,
            Some((refresh, highlights)) => {
                self.state = State::Initialized {
                    doc_len: update.doc.len(),
                    viewport: clamp_viewport(update.doc, update.viewport),
                    highlights,
                };
                refresh
            }
            None => {
                self.attach(update.doc, update.viewport);
                Refresh::Full
            }
        }
    }

    /// Compute the incremental result, or `None` when a full rescan is
    /// required.
    fn try_incremental(
        &self,
        old_len: usize,
        old_viewport: &Range<usize>,
        old: &[Range<usize>],
        update: ViewUpdate<'_>,
    ) -> Option<(Refresh, Vec<Range<usize>>)> {
        let doc = update.doc;
        let changes = update.changes;
        let viewport = clamp_viewport(doc, update.viewport);

        if changes.is_empty() {
            return (*old_viewport == viewport).then(|| (Refresh::Unchanged, Vec::new()));
        }
        if changes.new_len(old_len) != Some(doc.len()) {
            trace!("Change set does not match document length, rescanning");
            return None;
        }

        let mapped_viewport = changes.map_pos(old_viewport.start, Assoc::Before)
            ..changes.map_pos(old_viewport.end, Assoc::After);
        if mapped_viewport != viewport || self.pattern.prefix_has_brackets() {
            return None;
        }

        let (old_span, new_span) = changes.envelope()?;
        if old_span.len() > MAX_INCREMENTAL_SPAN || new_span.len() > MAX_INCREMENTAL_SPAN {
            return None;
        }

        let cf = new_span.start;
        let ct = new_span.end;
        let restart = self.restart_point(doc, &viewport, cf)?;

        // Highlights that start before the restart point were produced by
        // attempts that never read the edited text.
        let split = old.partition_point(|h| h.start < restart);
        let head = &old[..split];
        if head.last().is_some_and(|h| h.end > cf) {
            return None;
        }

        let tail: Vec<Range<usize>> = old[split..]
            .iter()
            .filter(|h| h.start >= old_span.end)
            .map(|h| {
                changes.map_pos(h.start, Assoc::After)..changes.map_pos(h.end, Assoc::After)
            })
            .collect();

        let mut pos = head.last().map_or(restart, |h| h.end.max(restart));
        let mut fresh = Vec::new();
        let mut resync = None;

        while let Some(span) = self.pattern.span_at(doc, pos) {
            if span.start >= viewport.end {
                break;
            }
            if span.start >= ct
                && let Ok(idx) = tail.binary_search_by_key(&span.start, |h| h.start)
                && tail[idx] == span
            {
                resync = Some(idx);
                break;
            }
            pos = span.end;
            fresh.push(span);
        }

        trace!(
            "Incremental rescan from {restart}: {} fresh highlights, resync {resync:?}",
            fresh.len()
        );

        let mut highlights = Vec::with_capacity(head.len() + fresh.len() + tail.len());
        highlights.extend_from_slice(head);
        highlights.append(&mut fresh);
        if let Some(idx) = resync {
            highlights.extend_from_slice(&tail[idx..]);
        }
        Some((Refresh::Incremental, highlights))
    }

    /// Earliest position whose match attempt may have read text at or after
    /// `cf`. Returns `None` if offsets do not fall on char boundaries.
    fn restart_point(&self, doc: &str, viewport: &Range<usize>, cf: usize) -> Option<usize> {
        if cf <= viewport.start {
            return Some(viewport.start);
        }
        let before = doc.get(viewport.start..cf)?;

        // Bracketed attempts read up to the first `]` after their start.
        let after_close = before.rfind(']').map_or(0, |i| i + 1);
        let bracket = before[after_close..]
            .find('[')
            .map_or(cf, |i| viewport.start + after_close + i);

        // Bare attempts read the prefix, the citekey run, and one more char.
        let run_start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_citekey_char(*c))
            .last()
            .map_or(cf, |(i, _)| viewport.start + i);
        let mut bare = run_start
            .saturating_sub(self.pattern.prefix().len())
            .max(viewport.start);
        while !doc.is_char_boundary(bare) {
            bare -= 1;
        }

        Some(bracket.min(bare))
    }
}

/// Scan the viewport from its start, keeping every match that starts inside
/// it. The last match may extend past the viewport end.
pub fn full_scan(
    pattern: &CitationPattern,
    doc: &str,
    viewport: &Range<usize>,
) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut pos = viewport.start;
    while let Some(span) = pattern.span_at(doc, pos) {
        if span.start >= viewport.end {
            break;
        }
        pos = span.end;
        out.push(span);
    }
    out
}

fn clamp_viewport(doc: &str, viewport: &Range<usize>) -> Range<usize> {
    let floor = |mut pos: usize| {
        pos = pos.min(doc.len());
        while !doc.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    };
    let end = floor(viewport.end);
    floor(viewport.start).min(end)..end
}
