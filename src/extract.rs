//! Pull a chapter title and body out of arbitrary page HTML.
//!
//! Source pages are themed WordPress-style reader pages: the chapter name
//! lives in the breadcrumb trail (falling back to the first `<h1>`), and the
//! prose lives inside a `.reading-content` container. Selector chains are
//! tried in order and the first match with actual content wins; both chains
//! are configurable so a different source theme only needs new selectors,
//! not new code.

use scraper::{Html, Selector};

/// Title selectors, most specific first. Mirrors the source theme's
/// breadcrumb ("li.active" is the current chapter) with `<h1>` as fallback.
pub const DEFAULT_TITLE_SELECTORS: [&str; 2] = [".breadcrumb li.active", "h1"];

/// Content selectors, most specific first.
pub const DEFAULT_CONTENT_SELECTORS: [&str; 2] =
    [".reading-content .text-left", ".reading-content"];

/// A title/body pair pulled from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Chapter title, whitespace-normalised.
    pub title: String,
    /// Inner HTML of the matched content region, verbatim.
    pub content: String,
}

/// Extraction failures.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A configured selector string does not parse. Detected when the
    /// extractor is built, never per document.
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
    /// No content selector matched anything in the document.
    #[error("no content region matched the document")]
    ContentMissing,
}

/// Compiled selector chains for title and body extraction.
#[derive(Debug, Clone)]
pub struct Extractor {
    title_selectors: Vec<Selector>,
    content_selectors: Vec<Selector>,
}

impl Extractor {
    /// Compile selector chains. Fails on the first malformed selector so
    /// bad configuration surfaces at startup.
    pub fn new(titles: &[String], contents: &[String]) -> Result<Self, ExtractError> {
        Ok(Self {
            title_selectors: compile(titles)?,
            content_selectors: compile(contents)?,
        })
    }

    /// Compile the configured chains, falling back to the built-in ones
    /// where no override is given.
    pub fn with_overrides(
        titles: Option<&[String]>,
        contents: Option<&[String]>,
    ) -> Result<Self, ExtractError> {
        let titles: Vec<String> = match titles {
            Some(list) => list.to_vec(),
            None => DEFAULT_TITLE_SELECTORS.iter().map(|s| s.to_string()).collect(),
        };
        let contents: Vec<String> = match contents {
            Some(list) => list.to_vec(),
            None => DEFAULT_CONTENT_SELECTORS.iter().map(|s| s.to_string()).collect(),
        };
        Self::new(&titles, &contents)
    }

    /// Extract title and body from a page.
    ///
    /// The title falls back through the selector chain to `fallback_title`
    /// (callers pass the chapter slug). The body is the inner HTML of the
    /// first content selector that matches a non-empty region; a document
    /// with no content region at all is an error — upstream treats it as a
    /// failed relay attempt.
    pub fn extract(&self, html: &str, fallback_title: &str) -> Result<Extracted, ExtractError> {
        let document = Html::parse_document(html);

        let title = self
            .title_selectors
            .iter()
            .filter_map(|sel| document.select(sel).next())
            .map(|el| collapse_ws(&el.text().collect::<Vec<_>>().join(" ")))
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_title.to_string());

        let content = self
            .content_selectors
            .iter()
            .filter_map(|sel| document.select(sel).next())
            .map(|el| el.inner_html())
            .find(|c| !c.is_empty())
            .ok_or(ExtractError::ContentMissing)?;

        Ok(Extracted { title, content })
    }
}

impl Default for Extractor {
    fn default() -> Self {
        // The built-in chains are constants; parsing them cannot fail.
        Self::with_overrides(None, None).unwrap()
    }
}

fn compile(selectors: &[String]) -> Result<Vec<Selector>, ExtractError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| ExtractError::Selector {
                selector: s.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER_PAGE: &str = r#"
    <html><head><title>site</title></head><body>
    <ol class="breadcrumb">
        <li><a href="/">Home</a></li>
        <li><a href="/series/">Series</a></li>
        <li class="active">  Chapter 12 —
            The Long Night </li>
    </ol>
    <h1>Site Heading</h1>
    <div class="reading-content">
        <div class="text-left">
            <p>First paragraph of the chapter.</p>
            <p>Second paragraph, with <em>emphasis</em>.</p>
        </div>
    </div>
    </body></html>
    "#;

    #[test]
    fn test_breadcrumb_title_beats_h1() {
        let ex = Extractor::default();
        let out = ex.extract(CHAPTER_PAGE, "ch-12").unwrap();
        assert_eq!(out.title, "Chapter 12 — The Long Night");
    }

    #[test]
    fn test_inner_html_preserved() {
        let ex = Extractor::default();
        let out = ex.extract(CHAPTER_PAGE, "ch-12").unwrap();
        assert!(out.content.contains("<p>First paragraph of the chapter.</p>"));
        assert!(out.content.contains("<em>emphasis</em>"));
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let html = r#"
        <html><body>
        <h1>Chapter 3</h1>
        <div class="reading-content"><p>Prose here.</p></div>
        </body></html>
        "#;
        let ex = Extractor::default();
        let out = ex.extract(html, "ch-3").unwrap();
        assert_eq!(out.title, "Chapter 3");
    }

    #[test]
    fn test_empty_breadcrumb_falls_through() {
        // An active breadcrumb item with no text must not shadow the h1.
        let html = r#"
        <html><body>
        <ol class="breadcrumb"><li class="active"></li></ol>
        <h1>Chapter 4</h1>
        <div class="reading-content"><p>Prose.</p></div>
        </body></html>
        "#;
        let ex = Extractor::default();
        let out = ex.extract(html, "ch-4").unwrap();
        assert_eq!(out.title, "Chapter 4");
    }

    #[test]
    fn test_title_falls_back_to_slug() {
        let html = r#"<html><body><div class="reading-content"><p>x</p></div></body></html>"#;
        let ex = Extractor::default();
        let out = ex.extract(html, "ch-777").unwrap();
        assert_eq!(out.title, "ch-777");
    }

    #[test]
    fn test_text_left_preferred_over_container() {
        let out = Extractor::default().extract(CHAPTER_PAGE, "ch-12").unwrap();
        // The outer .reading-content match would contain the wrapper div.
        assert!(!out.content.contains("text-left"));
    }

    #[test]
    fn test_container_fallback_when_no_text_left() {
        let html = r#"
        <html><body>
        <div class="reading-content"><p>Direct prose, no wrapper.</p></div>
        </body></html>
        "#;
        let out = Extractor::default().extract(html, "s").unwrap();
        assert!(out.content.contains("Direct prose"));
    }

    #[test]
    fn test_content_missing() {
        let html = "<html><body><p>Not a reader page.</p></body></html>";
        let err = Extractor::default().extract(html, "s").unwrap_err();
        assert!(matches!(err, ExtractError::ContentMissing));
    }

    #[test]
    fn test_bad_selector_rejected_at_build() {
        let err = Extractor::new(&["li.active".to_string()], &[":::nope".to_string()]);
        assert!(matches!(err, Err(ExtractError::Selector { .. })));
    }

    #[test]
    fn test_partial_override_keeps_other_default_chain() {
        let contents = vec!["article.page".to_string()];
        let ex = Extractor::with_overrides(None, Some(&contents)).unwrap();

        let html = r#"
        <html><body>
        <h1>Still Default Title</h1>
        <article class="page"><p>Custom region prose.</p></article>
        </body></html>
        "#;
        let out = ex.extract(html, "slug").unwrap();
        assert_eq!(out.title, "Still Default Title");
        assert!(out.content.contains("Custom region prose"));
    }
}
