//! Plain-text rendering of extracted chapter HTML.
//!
//! The cache stores the content region verbatim; the terminal wants prose.
//! This walks the fragment tree, drops script/style, turns `<br>` and
//! block elements into line breaks, and collapses the leftover whitespace.

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Render an HTML fragment as readable plain text. Paragraph-level
/// elements become blank-line-separated blocks.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    walk(fragment.root_element(), &mut out);
    newline_runs().replace_all(out.trim(), "\n\n").into_owned()
}

fn walk(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => push_text(out, &**t),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child_el.value().name();
                if matches!(name, "script" | "style" | "noscript" | "template") {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = is_block(name);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                walk(child_el, out);
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "blockquote"
            | "li"
            | "tr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
    )
}

/// Append a text node with its whitespace collapsed, inserting a single
/// separating space where the source had one.
fn push_text(out: &mut String, text: &str) {
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return;
    };
    if text.starts_with(char::is_whitespace) && needs_separator(out) {
        out.push(' ');
    }
    out.push_str(first);
    for word in words {
        out.push(' ');
        out.push_str(word);
    }
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn needs_separator(out: &str) -> bool {
    !out.is_empty() && !out.ends_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_blocks() {
        let text = html_to_text("<p>First paragraph.</p><p>Second paragraph.</p>");
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_br_breaks_lines_within_a_block() {
        let text = html_to_text("<p>line one<br>line two</p>");
        assert_eq!(text, "line one\nline two");
    }

    #[test]
    fn test_inline_markup_keeps_word_spacing() {
        let text = html_to_text("<p>He spoke <em>softly</em> and carried on.</p>");
        assert_eq!(text, "He spoke softly and carried on.");
    }

    #[test]
    fn test_script_and_style_are_dropped() {
        let text = html_to_text(
            "<div><script>var x = 1;</script><style>p{}</style><p>Kept.</p></div>",
        );
        assert_eq!(text, "Kept.");
    }

    #[test]
    fn test_source_whitespace_is_collapsed() {
        let text = html_to_text("<p>\n      spread\n      over\n      lines\n    </p>");
        assert_eq!(text, "spread over lines");
    }

    #[test]
    fn test_deep_nesting_collapses_blank_lines() {
        let text = html_to_text(
            "<div><div><p>One.</p></div><div></div><div><p>Two.</p></div></div>",
        );
        assert_eq!(text, "One.\n\nTwo.");
    }

    #[test]
    fn test_entities_are_decoded() {
        let text = html_to_text("<p>Stone &amp; Scape &mdash; part 1</p>");
        assert_eq!(text, "Stone & Scape \u{2014} part 1");
    }

    #[test]
    fn test_empty_and_whitespace_only_input() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("   \n  "), "");
        assert_eq!(html_to_text("<div>   </div>"), "");
    }
}
