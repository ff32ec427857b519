//! A minimal rendered-document tree.
//!
//! A [`Fragment`] is what a renderer hands to post-processors: a list of
//! nodes, each of which is literal text, an element with children, or a
//! citation marker inserted by the annotator.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// CSS class carried by citation markers.
pub const CITATION_CLASS: &str = "biblatex-citation";

/// Callback invoked with the citekey when a marker is activated.
pub type ActivateHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// A rendered document fragment.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub children: Vec<Node>,
}

impl Fragment {
    /// Create a fragment from a list of nodes.
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Concatenated text of every node in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            node.collect_text(&mut out);
        }
        out
    }

    /// All citation markers in document order.
    pub fn markers(&self) -> Vec<&CitationMarker> {
        let mut out = Vec::new();
        for node in &self.children {
            node.collect_markers(&mut out);
        }
        out
    }

    /// Serialize the fragment to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            node.write_html(&mut out);
        }
        out
    }
}

/// A node of a rendered fragment.
#[derive(Debug, Clone)]
pub enum Node {
    /// A literal text leaf.
    Text(String),

    /// An element with attributes and children.
    Element(Element),

    /// An interactive citation marker.
    Citation(CitationMarker),
}

impl Node {
    /// Create a text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Self::Citation(marker) => out.push_str(&marker.label),
        }
    }

    fn collect_markers<'a>(&'a self, out: &mut Vec<&'a CitationMarker>) {
        match self {
            Self::Text(_) => {}
            Self::Element(element) => {
                for child in &element.children {
                    child.collect_markers(out);
                }
            }
            Self::Citation(marker) => out.push(marker),
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Self::Text(text) => escape_html(out, text),
            Self::Element(element) => element.write_html(out),
            Self::Citation(marker) => {
                let _ = write!(out, "<span class=\"{CITATION_CLASS}\" data-citekey=\"");
                escape_html(out, &marker.citekey);
                out.push_str("\">");
                escape_html(out, &marker.label);
                out.push_str("</span>");
            }
        }
    }
}

/// An element node.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add a child node.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    fn is_void(&self) -> bool {
        matches!(self.tag.as_str(), "br" | "hr" | "img" | "input")
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {name}=\"");
            escape_html(out, value);
            out.push('"');
        }
        out.push('>');
        if self.is_void() {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

/// An activation event delivered to a marker, e.g. a click.
#[derive(Debug, Default)]
pub struct Activation {
    default_prevented: bool,
}

impl Activation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress the host's default handling of this activation.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// An interactive marker standing in for a matched citation.
#[derive(Clone)]
pub struct CitationMarker {
    /// The full matched text, shown as the marker's label.
    pub label: String,

    /// The citekey extracted from the match.
    pub citekey: String,

    on_activate: Option<ActivateHandler>,
}

impl CitationMarker {
    /// Create a marker without an activation handler.
    pub fn new(label: impl Into<String>, citekey: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            citekey: citekey.into(),
            on_activate: None,
        }
    }

    /// Attach the activation handler.
    pub fn with_handler(mut self, handler: ActivateHandler) -> Self {
        self.on_activate = Some(handler);
        self
    }

    /// Deliver an activation to this marker.
    pub fn activate(&self, event: &mut Activation) {
        event.prevent_default();
        if let Some(handler) = &self.on_activate {
            handler(&self.citekey);
        }
    }
}

impl fmt::Debug for CitationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CitationMarker")
            .field("label", &self.label)
            .field("citekey", &self.citekey)
            .field("has_handler", &self.on_activate.is_some())
            .finish()
    }
}

pub(crate) fn escape_html(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
