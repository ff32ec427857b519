//! Markdown rendering into [`Fragment`] trees.

use pulldown_cmark::{Event, Options, Parser, Tag};

use crate::fragment::{Element, Fragment, Node};

/// Render markdown into a fragment ready for post-processing.
///
/// Adjacent text events are merged into a single leaf, so a citation the
/// parser happened to split (e.g. at `[`) is still seen whole.
pub fn render_markdown(markdown: &str) -> Fragment {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    // The bottom of the stack collects top-level nodes.
    let mut stack = vec![Element::default()];

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => stack.push(element_for(&tag)),
            Event::End(_) => {
                if stack.len() > 1
                    && let Some(done) = stack.pop()
                {
                    push_node(&mut stack, done.into());
                }
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                push_text(&mut stack, &text);
            }
            Event::Code(code) => {
                push_node(&mut stack, Element::new("code").with_child(Node::text(&*code)).into());
            }
            Event::SoftBreak => push_text(&mut stack, "\n"),
            Event::HardBreak => push_node(&mut stack, Element::new("br").into()),
            Event::Rule => push_node(&mut stack, Element::new("hr").into()),
            Event::TaskListMarker(checked) => {
                let mut input = Element::new("input").with_attribute("type", "checkbox");
                if checked {
                    input = input.with_attribute("checked", "");
                }
                push_node(&mut stack, input.into());
            }
            Event::FootnoteReference(name) => {
                push_node(&mut stack, Element::new("sup").with_child(Node::text(&*name)).into());
            }
        }
    }

    // Close anything still open.
    while stack.len() > 1 {
        if let Some(done) = stack.pop() {
            push_node(&mut stack, done.into());
        }
    }

    Fragment::new(stack.pop().map(|root| root.children).unwrap_or_default())
}

fn element_for(tag: &Tag<'_>) -> Element {
    match tag {
        Tag::Paragraph => Element::new("p"),
        Tag::Heading { level, .. } => Element::new(format!("h{}", *level as usize)),
        Tag::BlockQuote => Element::new("blockquote"),
        Tag::CodeBlock(_) => Element::new("pre"),
        Tag::List(Some(start)) if *start != 1 => {
            Element::new("ol").with_attribute("start", start.to_string())
        }
        Tag::List(Some(_)) => Element::new("ol"),
        Tag::List(None) => Element::new("ul"),
        Tag::Item => Element::new("li"),
        Tag::Emphasis => Element::new("em"),
        Tag::Strong => Element::new("strong"),
        Tag::Strikethrough => Element::new("del"),
        Tag::Link {
            dest_url, title, ..
        } => {
            let link = Element::new("a").with_attribute("href", dest_url.to_string());
            if title.is_empty() {
                link
            } else {
                link.with_attribute("title", title.to_string())
            }
        }
        Tag::Image { dest_url, .. } => Element::new("img").with_attribute("src", dest_url.to_string()),
        Tag::Table(_) => Element::new("table"),
        Tag::TableHead => Element::new("thead"),
        Tag::TableRow => Element::new("tr"),
        Tag::TableCell => Element::new("td"),
        _ => Element::new("div"),
    }
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    match parent.children.last_mut() {
        Some(Node::Text(last)) => last.push_str(text),
        _ => parent.children.push(Node::text(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::fragment::ActivateHandler;
    use crate::pattern::CitationPattern;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_bracketed_citation_stays_in_one_leaf() {
        let fragment = render_markdown("See @doe2020 and [@smith1999, p. 4] for details.");
        let Node::Element(p) = &fragment.children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.tag, "p");
        assert_eq!(p.children.len(), 1);
        assert_eq!(
            fragment.text_content(),
            "See @doe2020 and [@smith1999, p. 4] for details."
        );
    }

    #[test]
    fn test_render_and_annotate() {
        let mut fragment = render_markdown("See @doe2020 and [@smith1999, p. 4] for details.");
        let pattern = CitationPattern::compile("@").unwrap();
        let handler: ActivateHandler = Arc::new(|_: &str| {});

        assert_eq!(annotate(&mut fragment, &pattern, &handler), 2);
        assert_eq!(
            fragment.to_html(),
            "<p>See <span class=\"biblatex-citation\" data-citekey=\"doe2020\">@doe2020</span> \
             and <span class=\"biblatex-citation\" data-citekey=\"smith1999\">[@smith1999, p. 4]</span> \
             for details.</p>"
        );
    }

    #[test]
    fn test_block_structure() {
        let fragment = render_markdown("## Notes\n\n- one @a\n- *two*\n\n---\n");
        assert_eq!(
            fragment.to_html(),
            "<h2>Notes</h2><ul><li>one @a</li><li><em>two</em></li></ul><hr>"
        );
    }

    #[test]
    fn test_links_and_code() {
        let fragment = render_markdown("[docs](https://example.com \"Docs\") and `@code`");
        assert_eq!(
            fragment.to_html(),
            "<p><a href=\"https://example.com\" title=\"Docs\">docs</a> and <code>@code</code></p>"
        );
    }
}
