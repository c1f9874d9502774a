//! Chapter catalog: the ordered list of known chapters and lookups over it.
//!
//! The catalog file is a JSON array of `{title, slug}` records. Publication
//! feeds usually list newest first; the catalog normalizes to reading order
//! (oldest first) so position arithmetic and prev/next stay simple.

use crate::fetch::client::HttpClient;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub slug: String,
}

/// Where the catalog comes from: a local file or a hosted JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    File(PathBuf),
    Remote(String),
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::File(path) => write!(f, "{}", path.display()),
            CatalogSource::Remote(url) => f.write_str(url),
        }
    }
}

/// Outcome of resolving a user-supplied chapter reference.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// Exactly one chapter matched.
    Found(&'a Chapter),
    /// Several chapters matched the query; candidates in reading order.
    Ambiguous(Vec<&'a Chapter>),
    /// Nothing matched.
    NotFound,
}

/// In-memory catalog, indexed by slug, in reading order.
pub struct Catalog {
    chapters: Vec<Chapter>,
    by_slug: HashMap<String, usize>,
    /// Longest slug prefix shared by every chapter, for compact display.
    common_prefix: String,
}

impl Catalog {
    /// Build a catalog from raw rows. `newest_first` says the input is in
    /// publication order and must be reversed. Duplicate slugs keep the
    /// first occurrence.
    pub fn from_chapters(mut chapters: Vec<Chapter>, newest_first: bool) -> Self {
        if newest_first {
            chapters.reverse();
        }

        let mut by_slug = HashMap::with_capacity(chapters.len());
        let mut kept = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            if by_slug.contains_key(&chapter.slug) {
                tracing::warn!("duplicate slug in catalog, keeping first: {}", chapter.slug);
                continue;
            }
            by_slug.insert(chapter.slug.clone(), kept.len());
            kept.push(chapter);
        }

        let common_prefix = common_slug_prefix(&kept);
        Self {
            chapters: kept,
            by_slug,
            common_prefix,
        }
    }

    /// Load the catalog from a JSON file.
    pub fn load_file(path: &Path, newest_first: bool) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        let chapters: Vec<Chapter> = serde_json::from_str(&data)
            .with_context(|| format!("catalog is not a JSON chapter array: {}", path.display()))?;
        tracing::debug!("catalog loaded: {} chapters from {}", chapters.len(), path.display());
        Ok(Self::from_chapters(chapters, newest_first))
    }

    /// Load the catalog from wherever the settings point. The index is
    /// hosted statically, so remote sources are fetched directly, not
    /// through the relays.
    pub async fn load(
        source: &CatalogSource,
        client: &HttpClient,
        newest_first: bool,
    ) -> Result<Self> {
        match source {
            CatalogSource::File(path) => Self::load_file(path, newest_first),
            CatalogSource::Remote(url) => {
                let resp = client
                    .get_text(url)
                    .await
                    .with_context(|| format!("failed to fetch catalog: {url}"))?;
                if !resp.is_success() {
                    bail!("catalog fetch returned HTTP {}: {url}", resp.status);
                }
                let chapters: Vec<Chapter> = serde_json::from_str(&resp.body)
                    .with_context(|| format!("catalog is not a JSON chapter array: {url}"))?;
                tracing::debug!("catalog loaded: {} chapters from {url}", chapters.len());
                Ok(Self::from_chapters(chapters, newest_first))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Chapters in reading order.
    pub fn iter(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter()
    }

    pub fn get(&self, slug: &str) -> Option<&Chapter> {
        self.by_slug.get(slug).map(|&i| &self.chapters[i])
    }

    /// Zero-based position in reading order.
    pub fn position(&self, slug: &str) -> Option<usize> {
        self.by_slug.get(slug).copied()
    }

    /// Chapter at `offset` from `slug` in reading order: `-1` for previous,
    /// `1` for next. None at either end of the catalog.
    pub fn neighbor(&self, slug: &str, offset: isize) -> Option<&Chapter> {
        let pos = self.position(slug)?;
        let target = pos.checked_add_signed(offset)?;
        self.chapters.get(target)
    }

    /// Case-insensitive substring filter over title and slug, preserving
    /// reading order. An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Chapter> {
        let needle = query.to_lowercase();
        self.chapters
            .iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&needle)
                    || c.slug.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Resolve a user-supplied reference to a chapter. An exact slug match
    /// wins outright; otherwise the query is treated as a substring filter
    /// and must land on a single chapter.
    pub fn resolve(&self, query: &str) -> Resolution<'_> {
        if let Some(chapter) = self.get(query) {
            return Resolution::Found(chapter);
        }
        let matches = self.search(query);
        match matches.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(matches[0]),
            _ => Resolution::Ambiguous(matches),
        }
    }

    /// Slug with the catalog-wide common prefix stripped, for list output.
    pub fn short_label<'a>(&self, chapter: &'a Chapter) -> &'a str {
        match chapter.slug.strip_prefix(&self.common_prefix) {
            Some(rest) if !rest.is_empty() => rest,
            _ => &chapter.slug,
        }
    }
}

/// Longest prefix shared by every slug. Only meaningful with two or more
/// chapters; a single slug would otherwise swallow itself.
fn common_slug_prefix(chapters: &[Chapter]) -> String {
    if chapters.len() < 2 {
        return String::new();
    }
    let mut prefix = chapters[0].slug.as_str();
    for chapter in &chapters[1..] {
        while !chapter.slug.starts_with(prefix) {
            let Some((cut, _)) = prefix.char_indices().last() else {
                return String::new();
            };
            prefix = &prefix[..cut];
        }
        if prefix.is_empty() {
            return String::new();
        }
    }
    prefix.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Chapter> {
        // Publication order: newest first.
        vec![
            Chapter {
                title: "Chapter 3 - Dusk".to_string(),
                slug: "novel-chapter-3".to_string(),
            },
            Chapter {
                title: "Chapter 2 - Noon".to_string(),
                slug: "novel-chapter-2".to_string(),
            },
            Chapter {
                title: "Chapter 1 - Dawn".to_string(),
                slug: "novel-chapter-1".to_string(),
            },
        ]
    }

    #[test]
    fn test_newest_first_input_is_reversed() {
        let catalog = Catalog::from_chapters(sample(), true);
        let slugs: Vec<_> = catalog.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(
            slugs,
            ["novel-chapter-1", "novel-chapter-2", "novel-chapter-3"]
        );
    }

    #[test]
    fn test_reading_order_input_kept_as_is() {
        let mut chapters = sample();
        chapters.reverse();
        let catalog = Catalog::from_chapters(chapters, false);
        assert_eq!(catalog.iter().next().unwrap().slug, "novel-chapter-1");
    }

    #[test]
    fn test_neighbors_and_bounds() {
        let catalog = Catalog::from_chapters(sample(), true);
        assert_eq!(
            catalog.neighbor("novel-chapter-2", 1).unwrap().slug,
            "novel-chapter-3"
        );
        assert_eq!(
            catalog.neighbor("novel-chapter-2", -1).unwrap().slug,
            "novel-chapter-1"
        );
        assert!(catalog.neighbor("novel-chapter-1", -1).is_none());
        assert!(catalog.neighbor("novel-chapter-3", 1).is_none());
        assert!(catalog.neighbor("unknown", 1).is_none());
    }

    #[test]
    fn test_search_matches_title_or_slug_case_insensitive() {
        let catalog = Catalog::from_chapters(sample(), true);
        assert_eq!(catalog.search("DAWN").len(), 1);
        assert_eq!(catalog.search("chapter-2").len(), 1);
        assert_eq!(catalog.search("novel").len(), 3);
        assert!(catalog.search("missing").is_empty());
    }

    #[test]
    fn test_resolve_exact_then_unique_substring() {
        let catalog = Catalog::from_chapters(sample(), true);
        match catalog.resolve("novel-chapter-2") {
            Resolution::Found(c) => assert_eq!(c.title, "Chapter 2 - Noon"),
            other => panic!("expected exact match, got {other:?}"),
        }
        match catalog.resolve("dusk") {
            Resolution::Found(c) => assert_eq!(c.slug, "novel-chapter-3"),
            other => panic!("expected unique substring match, got {other:?}"),
        }
        assert!(matches!(catalog.resolve("chapter"), Resolution::Ambiguous(_)));
        assert!(matches!(catalog.resolve("zzz"), Resolution::NotFound));
    }

    #[test]
    fn test_duplicate_slugs_keep_first() {
        let mut chapters = sample();
        chapters.push(Chapter {
            title: "Chapter 3 again".to_string(),
            slug: "novel-chapter-3".to_string(),
        });
        let catalog = Catalog::from_chapters(chapters, false);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("novel-chapter-3").unwrap().title, "Chapter 3 - Dusk");
    }

    #[test]
    fn test_empty_catalog_yields_no_matches() {
        let catalog = Catalog::from_chapters(Vec::new(), true);
        assert!(catalog.is_empty());
        assert_eq!(catalog.len(), 0);
        assert!(catalog.iter().next().is_none());
        assert!(catalog.search("").is_empty());
        assert!(catalog.search("anything").is_empty());
        assert!(catalog.get("novel-chapter-1").is_none());
        assert!(catalog.position("novel-chapter-1").is_none());
        assert!(catalog.neighbor("novel-chapter-1", 1).is_none());
        assert!(matches!(catalog.resolve("novel"), Resolution::NotFound));
    }

    #[test]
    fn test_short_label_strips_shared_prefix() {
        let catalog = Catalog::from_chapters(sample(), true);
        let ch = catalog.get("novel-chapter-2").unwrap();
        assert_eq!(catalog.short_label(ch), "2");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"title": "Only One", "slug": "only-one"}]"#,
        )
        .unwrap();
        let catalog = Catalog::load_file(&path, true).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("only-one").unwrap().title, "Only One");
    }

    #[tokio::test]
    async fn test_load_remote() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chapters.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"title": "Hosted", "slug": "hosted-1"}]"#),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(5);
        let source = CatalogSource::Remote(format!("{}/chapters.json", server.uri()));
        let catalog = Catalog::load(&source, &client, false).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("hosted-1").unwrap().title, "Hosted");

        let missing = CatalogSource::Remote(format!("{}/nope.json", server.uri()));
        assert!(Catalog::load(&missing, &client, false).await.is_err());
    }
}
