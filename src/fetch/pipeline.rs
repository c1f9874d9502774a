//! The fetch pipeline: cache first, then relays in order until one yields
//! a usable chapter.
//!
//! Rotation is sticky. Attempts start at the relay that served the last
//! success, so one dead relay costs one wasted request per process run,
//! not one per chapter. Two gates guard against relays that answer 200
//! with junk: a minimum document size before parsing and a minimum
//! extracted-content length after.

use crate::cache::{CacheEntry, CacheStats, ChapterCache};
use crate::config::Settings;
use crate::extract::{ExtractError, Extracted, Extractor};
use crate::fetch::client::HttpClient;
use crate::fetch::proxy::ProxyEndpoint;
use crate::fetch::{chapter_url, AttemptFailure, FetchError, FetchedChapter};
use crate::progress::{FetchEventKind, ProgressBus};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shared fetch engine. Safe to use from concurrent tasks; the cache is
/// behind an async mutex and the preferred-relay index is atomic.
pub struct Fetcher {
    client: HttpClient,
    proxies: Vec<ProxyEndpoint>,
    base_url: String,
    extractor: Extractor,
    cache: Mutex<ChapterCache>,
    /// Index of the relay to try first, updated on every success.
    preferred: AtomicUsize,
    bus: ProgressBus,
    min_document_bytes: usize,
    min_content_chars: usize,
}

impl Fetcher {
    /// Build a fetcher from settings. `initial_proxy` seeds the rotation
    /// start point, normally the persisted index of the last relay that
    /// worked. Fails when a configured selector override does not parse,
    /// so bad config surfaces here instead of per document.
    pub fn new(
        settings: &Settings,
        cache: ChapterCache,
        bus: ProgressBus,
        initial_proxy: usize,
    ) -> Result<Self, ExtractError> {
        let extractor = Extractor::with_overrides(
            settings.title_selectors.as_deref(),
            settings.content_selectors.as_deref(),
        )?;
        let start = match settings.proxies.len() {
            0 => 0,
            n => initial_proxy % n,
        };
        Ok(Self {
            client: HttpClient::new(settings.request_timeout_secs),
            proxies: settings.proxies.clone(),
            base_url: settings.base_url.clone(),
            extractor,
            cache: Mutex::new(cache),
            preferred: AtomicUsize::new(start),
            bus,
            min_document_bytes: settings.min_document_bytes,
            min_content_chars: settings.min_content_chars,
        })
    }

    /// Fetch one chapter. Cache hits return immediately unless `force`;
    /// otherwise relays are tried in rotation order and the first usable
    /// document wins. A network success is cached before returning; a
    /// cache write failure downgrades to a warning.
    pub async fn fetch_chapter(
        &self,
        slug: &str,
        force: bool,
    ) -> Result<FetchedChapter, FetchError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        self.bus.emit(
            request_id,
            FetchEventKind::Started {
                slug: slug.to_string(),
            },
        );

        if !force {
            if let Some(entry) = self.cache.lock().await.get(slug) {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.bus.emit(
                    request_id,
                    FetchEventKind::CacheHit {
                        slug: slug.to_string(),
                    },
                );
                self.bus.emit(
                    request_id,
                    FetchEventKind::Completed {
                        slug: slug.to_string(),
                        proxy: entry.proxy.clone(),
                        from_cache: true,
                        elapsed_ms,
                    },
                );
                return Ok(FetchedChapter {
                    slug: entry.slug,
                    title: entry.title,
                    content: entry.content,
                    proxy: entry.proxy,
                    from_cache: true,
                    fetched_at: entry.fetched_at,
                    attempts: 0,
                    elapsed_ms,
                    request_id,
                });
            }
        }

        let target = chapter_url(&self.base_url, slug);
        let start_at = self.preferred.load(Ordering::Relaxed);
        let mut failures: Vec<AttemptFailure> = Vec::with_capacity(self.proxies.len());

        for i in 0..self.proxies.len() {
            let idx = (start_at + i) % self.proxies.len();
            let proxy = &self.proxies[idx];
            self.bus.emit(
                request_id,
                FetchEventKind::ProxyAttempt {
                    slug: slug.to_string(),
                    proxy: proxy.name.clone(),
                    attempt: i + 1,
                },
            );

            match self.attempt_via(proxy, &target, slug).await {
                Ok(extracted) => {
                    let content_chars = extracted.content.chars().count();
                    self.bus.emit(
                        request_id,
                        FetchEventKind::Extracted {
                            slug: slug.to_string(),
                            title: extracted.title.clone(),
                            content_chars,
                        },
                    );

                    let fetched_at = Utc::now();
                    let entry = CacheEntry {
                        slug: slug.to_string(),
                        title: extracted.title.clone(),
                        content: extracted.content.clone(),
                        fetched_at,
                        proxy: proxy.name.clone(),
                    };
                    match self.cache.lock().await.put(&entry) {
                        Ok(_) => self.bus.emit(
                            request_id,
                            FetchEventKind::Cached {
                                slug: slug.to_string(),
                            },
                        ),
                        Err(e) => {
                            tracing::warn!("failed to cache {slug}: {e:#}");
                            self.bus.emit(
                                request_id,
                                FetchEventKind::Warning {
                                    slug: slug.to_string(),
                                    message: format!("cache write failed: {e}"),
                                },
                            );
                        }
                    }

                    self.preferred.store(idx, Ordering::Relaxed);
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    self.bus.emit(
                        request_id,
                        FetchEventKind::Completed {
                            slug: slug.to_string(),
                            proxy: proxy.name.clone(),
                            from_cache: false,
                            elapsed_ms,
                        },
                    );
                    return Ok(FetchedChapter {
                        slug: slug.to_string(),
                        title: extracted.title,
                        content: extracted.content,
                        proxy: proxy.name.clone(),
                        from_cache: false,
                        fetched_at,
                        attempts: i + 1,
                        elapsed_ms,
                        request_id,
                    });
                }
                Err(e) => {
                    tracing::debug!("relay {} failed for {slug}: {e}", proxy.name);
                    let reason = e.to_string();
                    self.bus.emit(
                        request_id,
                        FetchEventKind::ProxyFailed {
                            slug: slug.to_string(),
                            proxy: proxy.name.clone(),
                            reason: reason.clone(),
                        },
                    );
                    failures.push(AttemptFailure {
                        proxy: proxy.name.clone(),
                        reason,
                    });
                }
            }
        }

        let err = FetchError::AllProxiesFailed {
            slug: slug.to_string(),
            attempts: failures,
        };
        self.bus.emit(
            request_id,
            FetchEventKind::Failed {
                slug: slug.to_string(),
                error: err.to_string(),
            },
        );
        Err(err)
    }

    /// One relay attempt: request, unwrap, gate, extract, gate.
    async fn attempt_via(
        &self,
        proxy: &ProxyEndpoint,
        target: &str,
        slug: &str,
    ) -> Result<Extracted, FetchError> {
        let request = proxy.request_url(target);
        let resp = self.client.get_text(&request).await?;
        if !resp.is_success() {
            return Err(FetchError::Status {
                status: resp.status,
                url: request,
            });
        }

        let document = proxy.unwrap_body(&resp.body)?;
        if document.len() < self.min_document_bytes {
            return Err(FetchError::DocumentTooSmall {
                bytes: document.len(),
            });
        }

        let extracted = self.extractor.extract(&document, slug)?;
        let chars = extracted.content.chars().count();
        if chars <= self.min_content_chars {
            return Err(FetchError::ContentTooShort { chars });
        }
        Ok(extracted)
    }

    /// Prefetch many chapters with bounded concurrency. Results keep their
    /// slug since completion order is arbitrary.
    pub async fn fetch_many(
        &self,
        slugs: &[String],
        concurrency: usize,
        force: bool,
    ) -> Vec<(String, Result<FetchedChapter, FetchError>)> {
        stream::iter(slugs.iter().cloned())
            .map(|slug| async move {
                let result = self.fetch_chapter(&slug, force).await;
                (slug, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Relay index the next fetch will start from.
    pub fn preferred_proxy(&self) -> usize {
        self.preferred.load(Ordering::Relaxed)
    }

    pub async fn is_cached(&self, slug: &str) -> bool {
        self.cache.lock().await.contains(slug)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ChapterCache;
    use crate::fetch::proxy::ProxyKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Chapter page large enough to pass the document gate, with enough
    /// prose to pass the content gate.
    fn chapter_page(title: &str) -> String {
        let para = "<p>The corridor ran on far longer than the tower could \
                    possibly allow, and he counted his steps to stay sane.</p>";
        format!(
            "<html><body>\
             <ul class=\"breadcrumb\"><li>Series</li><li class=\"active\">{title}</li></ul>\
             <div class=\"reading-content\"><div class=\"text-left\">{}</div></div>\
             </body></html>",
            para.repeat(6)
        )
    }

    fn test_settings(proxies: Vec<ProxyEndpoint>) -> Settings {
        let mut settings = Settings::default();
        settings.base_url = "https://example.org/series/novel/".to_string();
        settings.proxies = proxies;
        settings
    }

    fn json_relay(server: &MockServer, route: &str) -> ProxyEndpoint {
        ProxyEndpoint {
            name: "MockJson".to_string(),
            prefix: format!("{}{route}?url=", server.uri()),
            kind: ProxyKind::JsonWrapped {
                field: "contents".to_string(),
            },
        }
    }

    fn raw_relay(server: &MockServer, route: &str) -> ProxyEndpoint {
        ProxyEndpoint {
            name: "MockRaw".to_string(),
            prefix: format!("{}{route}?url=", server.uri()),
            kind: ProxyKind::Raw,
        }
    }

    fn fetcher(settings: &Settings, dir: &tempfile::TempDir) -> Fetcher {
        let cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();
        Fetcher::new(settings, cache, ProgressBus::default(), 0).unwrap()
    }

    #[tokio::test]
    async fn test_json_relay_success_is_cached() {
        let server = MockServer::start().await;
        let page = chapter_page("Chapter 12");
        Mock::given(method("GET"))
            .and(path("/ao"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "contents": page })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let settings = test_settings(vec![json_relay(&server, "/ao")]);
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&settings, &dir);

        let first = fetcher.fetch_chapter("novel-chapter-12", false).await.unwrap();
        assert_eq!(first.title, "Chapter 12");
        assert!(!first.from_cache);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.proxy, "MockJson");

        // Second read must come from cache; the mock allows one hit only.
        let second = fetcher.fetch_chapter("novel-chapter-12", false).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.attempts, 0);
        assert_eq!(second.content, first.content);
    }

    #[tokio::test]
    async fn test_small_document_rotates_to_next_relay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stub"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/good"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(chapter_page("Chapter 13")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut first = raw_relay(&server, "/stub");
        first.name = "Stub".to_string();
        let mut second = raw_relay(&server, "/good");
        second.name = "Good".to_string();

        let settings = test_settings(vec![first, second]);
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&settings, &dir);

        let chapter = fetcher.fetch_chapter("novel-chapter-13", false).await.unwrap();
        assert_eq!(chapter.proxy, "Good");
        assert_eq!(chapter.attempts, 2);
        // Rotation start point moved to the relay that worked.
        assert_eq!(fetcher.preferred_proxy(), 1);
    }

    #[tokio::test]
    async fn test_all_relays_failing_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut a = raw_relay(&server, "/a");
        a.name = "A".to_string();
        let mut b = raw_relay(&server, "/b");
        b.name = "B".to_string();

        let settings = test_settings(vec![a, b]);
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&settings, &dir);

        let err = fetcher.fetch_chapter("novel-chapter-14", false).await.unwrap_err();
        match err {
            FetchError::AllProxiesFailed { attempts, slug } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].proxy, "A");
                assert_eq!(attempts[1].proxy, "B");
                assert_eq!(slug, "novel-chapter-14");
            }
            other => panic!("expected AllProxiesFailed, got {other}"),
        }
        assert!(!fetcher.is_cached("novel-chapter-14").await);
    }

    #[tokio::test]
    async fn test_force_bypasses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ao"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "contents": chapter_page("Ch") })),
            )
            .expect(2)
            .mount(&server)
            .await;

        let settings = test_settings(vec![json_relay(&server, "/ao")]);
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&settings, &dir);

        fetcher.fetch_chapter("novel-chapter-15", false).await.unwrap();
        let refreshed = fetcher.fetch_chapter("novel-chapter-15", true).await.unwrap();
        assert!(!refreshed.from_cache);
        assert_eq!(refreshed.attempts, 1);
    }

    #[tokio::test]
    async fn test_selector_overrides_from_settings() {
        // A differently-themed source: entry-title heading, post-body prose.
        let para = "<p>Override prose that runs long enough to clear the \
                    content gate when repeated a handful of times.</p>";
        let page = format!(
            "<html><body><h2 class=\"entry-title\">Themed Title</h2>\
             <article class=\"post-body\">{}</article></body></html>",
            para.repeat(5)
        );

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let mut settings = test_settings(vec![raw_relay(&server, "/themed")]);
        settings.title_selectors = Some(vec![".entry-title".to_string()]);
        settings.content_selectors = Some(vec![".post-body".to_string()]);

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&settings, &dir);
        let chapter = fetcher.fetch_chapter("novel-chapter-16", false).await.unwrap();
        assert_eq!(chapter.title, "Themed Title");
        assert!(chapter.content.contains("Override prose"));
    }

    #[test]
    fn test_bad_selector_override_fails_construction() {
        let mut settings = Settings::default();
        settings.content_selectors = Some(vec![":::broken".to_string()]);

        let dir = tempfile::tempdir().unwrap();
        let cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();
        assert!(Fetcher::new(&settings, cache, ProgressBus::default(), 0).is_err());
    }
}
