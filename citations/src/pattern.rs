//! Citation pattern compilation and scanning.
//!
//! A [`CitationPattern`] is derived from the configured citation prefix and
//! recognises two surface forms:
//!
//! - bracketed: `[@doe2020]`, `[@doe2020, p. 12]`
//! - bare: `@doe2020`
//!
//! The bracketed alternative is listed first. `regex_lite` uses
//! leftmost-first alternation, so at any position a bracketed citation wins
//! over the bare citation nested inside it.

use std::ops::Range;

use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PatternError;

/// Punctuation allowed in a citekey, besides ASCII letters and digits.
const CITEKEY_PUNCTUATION: &str = "_:.#$%&+?<>~/-";

/// Whether `c` may appear in a citekey.
pub(crate) fn is_citekey_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || CITEKEY_PUNCTUATION.contains(c)
}

/// Regex class matching a run of citekey characters.
fn citekey_class() -> String {
    format!("[A-Za-z0-9{}]+", regex_lite::escape(CITEKEY_PUNCTUATION))
}

/// Which surface form a citation was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationForm {
    /// `[@citekey]` or `[@citekey, locator]`.
    Bracketed,
    /// `@citekey`.
    Bare,
}

/// A single citation found in a scanned text.
///
/// Offsets are byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMatch<'t> {
    /// The full matched text, brackets included.
    pub full_text: &'t str,

    /// The citekey without prefix or brackets.
    pub citekey: &'t str,

    /// Extra text after the comma of a bracketed citation, if any.
    pub locator: Option<&'t str>,

    /// Which form matched.
    pub form: CitationForm,

    /// Start offset of the match.
    pub start: usize,

    /// End offset of the match (exclusive).
    pub end: usize,
}

impl CitationMatch<'_> {
    /// Byte range of the match.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Convert to an owned [`Citation`].
    pub fn to_owned_citation(&self) -> Citation {
        Citation {
            text: self.full_text.to_string(),
            citekey: self.citekey.to_string(),
            locator: self.locator.map(str::to_string),
            form: self.form,
            start: self.start,
            end: self.end,
        }
    }
}

/// Owned form of a [`CitationMatch`], for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    pub citekey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub form: CitationForm,
    pub start: usize,
    pub end: usize,
}

/// A compiled citation pattern for one prefix.
#[derive(Debug, Clone)]
pub struct CitationPattern {
    prefix: String,

    /// Pattern with named captures for the citekey and locator.
    captures: Regex,

    /// Capture-free pattern for callers that only need span bounds.
    spans: Regex,
}

impl CitationPattern {
    /// Compile a pattern for `prefix`.
    ///
    /// The prefix is escaped, so any printable string is matched literally.
    pub fn compile(prefix: &str) -> Result<Self, PatternError> {
        if prefix.is_empty() {
            return Err(PatternError::EmptyPrefix);
        }

        let p = regex_lite::escape(prefix);
        let key = citekey_class();

        let captures = format!(
            r"\[{p}(?P<bracket_key>{key})(?:,\s*(?P<locator>[^\]]*))?\]|{p}(?P<bare_key>{key})"
        );
        let spans = format!(r"\[{p}{key}(?:,\s*[^\]]*)?\]|{p}{key}");

        let compile = |source: &str| {
            Regex::new(source).map_err(|source| PatternError::Compile {
                prefix: prefix.to_string(),
                source,
            })
        };

        let pattern = Self {
            prefix: prefix.to_string(),
            captures: compile(&captures)?,
            spans: compile(&spans)?,
        };

        debug!("Compiled citation pattern for prefix {prefix:?}");
        Ok(pattern)
    }

    /// The prefix this pattern was compiled from.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Find the first citation starting at or after `start`.
    ///
    /// Returns `None` when there are no more matches. `start` must lie on a
    /// char boundary.
    pub fn captures_at<'t>(&self, text: &'t str, start: usize) -> Option<CitationMatch<'t>> {
        if start > text.len() {
            return None;
        }
        self.captures
            .captures_at(text, start)
            .and_then(|caps| Self::to_match(&caps))
    }

    /// Iterate over all citations in `text`, leftmost-first and
    /// non-overlapping.
    pub fn matches<'p, 't>(&'p self, text: &'t str) -> CitationMatches<'p, 't> {
        CitationMatches {
            pattern: self,
            text,
            pos: 0,
        }
    }

    /// Span of the first citation starting at or after `start`.
    pub fn span_at(&self, text: &str, start: usize) -> Option<Range<usize>> {
        if start > text.len() {
            return None;
        }
        self.spans.find_at(text, start).map(|m| m.range())
    }

    /// Spans of all citations in `text`.
    pub fn spans<'t>(&self, text: &'t str) -> impl Iterator<Item = Range<usize>> {
        self.spans.find_iter(text).map(|m| m.range())
    }

    /// Whether the prefix itself contains a bracket character.
    ///
    /// Such prefixes break the assumption that a bracketed match ends at the
    /// first `]` after its start.
    pub(crate) fn prefix_has_brackets(&self) -> bool {
        self.prefix.contains(['[', ']'])
    }

    fn to_match<'t>(caps: &Captures<'t>) -> Option<CitationMatch<'t>> {
        let whole = caps.get(0)?;

        let (key, form) = match caps.name("bracket_key") {
            Some(key) => (key, CitationForm::Bracketed),
            None => (caps.name("bare_key")?, CitationForm::Bare),
        };

        Some(CitationMatch {
            full_text: whole.as_str(),
            citekey: key.as_str(),
            locator: caps
                .name("locator")
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty()),
            form,
            start: whole.start(),
            end: whole.end(),
        })
    }
}

/// Iterator over the citations in a text. See [`CitationPattern::matches`].
pub struct CitationMatches<'p, 't> {
    pattern: &'p CitationPattern,
    text: &'t str,
    pos: usize,
}

impl<'t> Iterator for CitationMatches<'_, 't> {
    type Item = CitationMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let m = self.pattern.captures_at(self.text, self.pos)?;
        // Matches are never empty, so this always makes progress.
        self.pos = m.end;
        Some(m)
    }
}
