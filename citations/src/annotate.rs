//! Post-processing of rendered fragments.
//!
//! The annotator walks every text leaf of a rendered [`Fragment`] and splices
//! citation markers in place of matched spans. Leaves without a citation are
//! left exactly where they are.

use tracing::trace;

use crate::fragment::{ActivateHandler, CitationMarker, Fragment, Node};
use crate::pattern::CitationPattern;

/// Replace every citation in `fragment`'s text leaves with a marker.
///
/// Each marker calls `on_activate` with its citekey when activated. Returns
/// the number of markers created. Existing markers are not rescanned, so a
/// second pass over an annotated fragment creates none.
pub fn annotate(
    fragment: &mut Fragment,
    pattern: &CitationPattern,
    on_activate: &ActivateHandler,
) -> usize {
    let created = annotate_children(&mut fragment.children, pattern, on_activate);
    trace!("Annotated fragment with {created} citation markers");
    created
}

fn annotate_children(
    children: &mut Vec<Node>,
    pattern: &CitationPattern,
    on_activate: &ActivateHandler,
) -> usize {
    let mut created = 0;
    let mut i = 0;

    while i < children.len() {
        let pieces = match &mut children[i] {
            Node::Text(text) => split_leaf(text, pattern, on_activate),
            Node::Element(element) => {
                created += annotate_children(&mut element.children, pattern, on_activate);
                None
            }
            Node::Citation(_) => None,
        };

        match pieces {
            Some((pieces, markers)) => {
                let len = pieces.len();
                children.splice(i..=i, pieces);
                created += markers;
                i += len;
            }
            None => i += 1,
        }
    }

    created
}

/// Split one text leaf into literal text and markers.
///
/// Returns `None` when the leaf contains no citation.
fn split_leaf(
    text: &str,
    pattern: &CitationPattern,
    on_activate: &ActivateHandler,
) -> Option<(Vec<Node>, usize)> {
    let mut pieces = Vec::new();
    let mut markers = 0;
    let mut last = 0;

    for m in pattern.matches(text) {
        if m.start > last {
            pieces.push(Node::text(&text[last..m.start]));
        }
        pieces.push(Node::Citation(
            CitationMarker::new(m.full_text, m.citekey).with_handler(on_activate.clone()),
        ));
        markers += 1;
        last = m.end;
    }

    if markers == 0 {
        return None;
    }
    if last < text.len() {
        pieces.push(Node::text(&text[last..]));
    }
    Some((pieces, markers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Activation, Element};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn noop() -> ActivateHandler {
        Arc::new(|_: &str| {})
    }

    fn pattern() -> CitationPattern {
        CitationPattern::compile("@").unwrap()
    }

    fn sample() -> Fragment {
        Fragment::new(vec![
            Element::new("p")
                .with_child(Node::text("See @doe2020 and "))
                .with_child(
                    Element::new("em").with_child(Node::text("[@smith1999, p. 4]")).into(),
                )
                .with_child(Node::text(" for details."))
                .into(),
            Element::new("p").with_child(Node::text("No citations here.")).into(),
        ])
    }

    #[test]
    fn test_annotate_splits_leaves() {
        let mut fragment = sample();
        let original = fragment.text_content();

        let created = annotate(&mut fragment, &pattern(), &noop());
        assert_eq!(created, 2);

        let markers: Vec<_> = fragment
            .markers()
            .iter()
            .map(|m| (m.label.clone(), m.citekey.clone()))
            .collect();
        assert_eq!(
            markers,
            vec![
                ("@doe2020".to_string(), "doe2020".to_string()),
                ("[@smith1999, p. 4]".to_string(), "smith1999".to_string()),
            ]
        );

        // Text round-trips exactly.
        assert_eq!(fragment.text_content(), original);

        let Node::Element(p) = &fragment.children[0] else {
            panic!("expected paragraph");
        };
        // "See ", marker, " and ", <em>, " for details."
        assert_eq!(p.children.len(), 5);
        assert!(matches!(&p.children[0], Node::Text(t) if t == "See "));
        assert!(matches!(&p.children[2], Node::Text(t) if t == " and "));
    }

    #[test]
    fn test_no_empty_literal_pieces() {
        let mut fragment = Fragment::new(vec![Node::text("@a@b")]);
        annotate(&mut fragment, &pattern(), &noop());

        // `@` is not a citekey character: two adjacent markers, no text between.
        assert_eq!(fragment.children.len(), 2);
        assert!(fragment
            .children
            .iter()
            .all(|n| matches!(n, Node::Citation(_))));
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let mut fragment = sample();
        let p = pattern();

        assert_eq!(annotate(&mut fragment, &p, &noop()), 2);
        let first: Vec<_> = fragment.markers().iter().map(|m| m.citekey.clone()).collect();

        assert_eq!(annotate(&mut fragment, &p, &noop()), 0);
        let second: Vec<_> = fragment.markers().iter().map(|m| m.citekey.clone()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_activation_reaches_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: ActivateHandler = Arc::new(move |key: &str| {
            sink.lock().unwrap().push(key.to_string());
        });

        let mut fragment = Fragment::new(vec![Node::text("cite [@knuth1984, ch. 1]")]);
        annotate(&mut fragment, &pattern(), &handler);

        let mut event = Activation::new();
        fragment.markers()[0].activate(&mut event);

        assert!(event.default_prevented());
        assert_eq!(*seen.lock().unwrap(), vec!["knuth1984".to_string()]);
    }

    #[test]
    fn test_untouched_leaves_keep_their_position() {
        let mut fragment = Fragment::new(vec![
            Node::text("plain"),
            Node::text("x @k y"),
            Node::text("tail"),
        ]);
        annotate(&mut fragment, &pattern(), &noop());

        let texts: Vec<_> = fragment
            .children
            .iter()
            .map(|n| match n {
                Node::Text(t) => t.clone(),
                Node::Citation(m) => format!("<{}>", m.citekey),
                Node::Element(_) => String::new(),
            })
            .collect();
        assert_eq!(texts, vec!["plain", "x ", "<k>", " y", "tail"]);
    }

    proptest! {
        #[test]
        fn prop_leaf_text_round_trips(text in "[@#\\[\\], ab1.é\n]{0,48}") {
            let mut fragment = Fragment::new(vec![Node::text(text.clone())]);
            let created = annotate(&mut fragment, &pattern(), &noop());

            prop_assert_eq!(fragment.text_content(), text.clone());
            prop_assert_eq!(created, pattern().matches(&text).count());
        }
    }
}
