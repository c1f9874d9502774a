//! CLI subcommand implementations for the folio binary.

pub mod cache_cmd;
pub mod doctor;
pub mod fetch_cmd;
pub mod list_cmd;
pub mod output;
pub mod read_cmd;
pub mod repl;
pub mod status_cmd;

use crate::audit::{AuditLog, AuditOutcome, AuditRecord};
use crate::cache::ChapterCache;
use crate::catalog::{Catalog, CatalogSource, Chapter, Resolution};
use crate::config::Settings;
use crate::fetch::client::HttpClient;
use crate::fetch::pipeline::Fetcher;
use crate::fetch::{FetchError, FetchedChapter};
use crate::progress::ProgressBus;
use crate::state::ReaderState;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use uuid::Uuid;

/// Load the catalog, with an actionable error when it is missing.
pub(crate) async fn load_catalog(settings: &Settings) -> Result<Catalog> {
    match settings.catalog_source()? {
        CatalogSource::File(path) => {
            if !path.exists() {
                bail!(
                    "no catalog at {} — save the chapter list there as a JSON array of {{\"title\", \"slug\"}}",
                    path.display()
                );
            }
            Catalog::load_file(&path, settings.catalog_newest_first)
        }
        source => {
            let client = HttpClient::new(settings.request_timeout_secs);
            Catalog::load(&source, &client, settings.catalog_newest_first).await
        }
    }
}

/// Resolve a user-supplied chapter reference or fail with candidates.
pub(crate) fn resolve_chapter<'a>(catalog: &'a Catalog, query: &str) -> Result<&'a Chapter> {
    match catalog.resolve(query) {
        Resolution::Found(chapter) => Ok(chapter),
        Resolution::NotFound => bail!("no chapter matches '{query}'"),
        Resolution::Ambiguous(matches) => {
            let mut lines = String::new();
            for chapter in matches.iter().take(8) {
                lines.push_str(&format!("\n    {}  {}", chapter.slug, chapter.title));
            }
            if matches.len() > 8 {
                lines.push_str(&format!("\n    ... and {} more", matches.len() - 8));
            }
            bail!("'{query}' matches {} chapters:{lines}", matches.len());
        }
    }
}

/// Build the fetch engine seeded with persisted state.
pub(crate) fn open_fetcher(
    settings: &Settings,
    bus: ProgressBus,
) -> Result<(Fetcher, ReaderState)> {
    let state = ReaderState::load(&settings.state_path()?);
    let cache = ChapterCache::open(settings.cache_dir()?, settings.max_cache_entries)
        .context("failed to open chapter cache")?;
    let fetcher = Fetcher::new(settings, cache, bus, state.preferred_proxy)
        .context("invalid selector override in config")?;
    Ok((fetcher, state))
}

/// Persist the rotation start point after fetching. Best effort.
pub(crate) fn save_state(settings: &Settings, state: &ReaderState) {
    match settings.state_path() {
        Ok(path) => {
            if let Err(e) = state.save(&path) {
                tracing::warn!("could not save reader state: {e:#}");
            }
        }
        Err(e) => tracing::warn!("could not resolve state path: {e:#}"),
    }
}

/// Append one audit line for a finished fetch. Best effort.
pub(crate) fn record_outcome(
    settings: &Settings,
    slug: &str,
    result: &Result<FetchedChapter, FetchError>,
    elapsed_ms: u64,
) {
    let Ok(path) = settings.audit_path() else {
        return;
    };
    let record = match result {
        Ok(chapter) => AuditRecord {
            timestamp: Utc::now(),
            request_id: chapter.request_id,
            slug: slug.to_string(),
            outcome: if chapter.from_cache {
                AuditOutcome::CacheHit
            } else {
                AuditOutcome::Fetched
            },
            proxy: Some(chapter.proxy.clone()),
            attempts: chapter.attempts,
            elapsed_ms,
            content_len: Some(chapter.content.chars().count()),
            error: None,
        },
        Err(e) => {
            let attempts = match e {
                FetchError::AllProxiesFailed { attempts, .. } => attempts.len(),
                _ => 0,
            };
            AuditRecord {
                timestamp: Utc::now(),
                request_id: Uuid::new_v4(),
                slug: slug.to_string(),
                outcome: AuditOutcome::Failed,
                proxy: None,
                attempts,
                elapsed_ms,
                content_len: None,
                error: Some(e.to_string()),
            }
        }
    };
    if let Err(e) = AuditLog::with_defaults(path).append(&record) {
        tracing::warn!("could not write audit log: {e:#}");
    }
}
