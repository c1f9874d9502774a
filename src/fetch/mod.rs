//! Chapter retrieval: relay endpoints, HTTP client, and the fallback
//! pipeline that ties them to extraction and the cache.

pub mod client;
pub mod pipeline;
pub mod proxy;

use crate::extract::ExtractError;
use chrono::{DateTime, Utc};
use proxy::UnwrapError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// One failed relay attempt, kept for the terminal error report.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    pub proxy: String,
    pub reason: String,
}

/// Why a single relay attempt, or a whole fetch, failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Unwrap(#[from] UnwrapError),

    /// The unwrapped document is too small to be a chapter page; relays
    /// answer 200 with stub bodies when the origin blocks them.
    #[error("document too small: {bytes} bytes")]
    DocumentTooSmall { bytes: usize },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Extraction matched a region but the body is too short to be real
    /// prose.
    #[error("extracted content too short: {chars} chars")]
    ContentTooShort { chars: usize },

    /// Terminal failure: every configured relay was tried once, with the
    /// per-relay reasons.
    #[error("all {} relay attempts failed for {slug} ({})", .attempts.len(), summarize(.attempts))]
    AllProxiesFailed {
        slug: String,
        attempts: Vec<AttemptFailure>,
    },
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.proxy, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A chapter as returned by the pipeline, whether served from cache or
/// fetched through a relay.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedChapter {
    pub slug: String,
    pub title: String,
    /// Inner HTML of the content region.
    pub content: String,
    /// Relay that originally served the chapter.
    pub proxy: String,
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
    /// Relay attempts this request made; 0 for cache hits.
    pub attempts: usize,
    pub elapsed_ms: u64,
    pub request_id: Uuid,
}

/// Upstream URL for a chapter: base joined with the slug, trailing slash
/// kept since the origin redirects bare paths.
pub fn chapter_url(base_url: &str, slug: &str) -> String {
    let slug = slug.trim_matches('/');
    format!("{base_url}{slug}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_url_joins_with_trailing_slash() {
        assert_eq!(
            chapter_url("https://example.org/series/novel/", "novel-chapter-1"),
            "https://example.org/series/novel/novel-chapter-1/"
        );
    }

    #[test]
    fn test_chapter_url_tolerates_slashed_slug() {
        assert_eq!(
            chapter_url("https://example.org/series/novel/", "/novel-chapter-1/"),
            "https://example.org/series/novel/novel-chapter-1/"
        );
    }

    #[test]
    fn test_all_proxies_failed_lists_each_relay() {
        let err = FetchError::AllProxiesFailed {
            slug: "novel-chapter-1".to_string(),
            attempts: vec![
                AttemptFailure {
                    proxy: "AllOrigins".to_string(),
                    reason: "document too small: 17 bytes".to_string(),
                },
                AttemptFailure {
                    proxy: "CodeTabs".to_string(),
                    reason: "request failed: timeout".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("all 2 relay attempts failed for novel-chapter-1"));
        assert!(msg.contains("AllOrigins: document too small"));
        assert!(msg.contains("CodeTabs: request failed"));
    }
}
