//! `folio read <chapter>` — fetch a chapter and print it.
//!
//! Also backs `folio next` and `folio prev`, which move relative to the
//! last chapter read.

use crate::catalog::{Catalog, Chapter};
use crate::cli::output::{self, Styled};
use crate::config::Settings;
use crate::progress::{FetchEventKind, ProgressBus};
use crate::text::html_to_text;
use anyhow::{bail, Result};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// How `read` prints the chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadFormat {
    /// Styled title plus plain text.
    Pretty,
    /// The stored HTML fragment, nothing else.
    Html,
    /// The full chapter record as JSON.
    Json,
}

/// Run the read command for a chapter reference (slug or search term).
pub async fn run(
    settings: &Settings,
    reference: &str,
    fresh: bool,
    format: ReadFormat,
) -> Result<()> {
    let catalog = crate::cli::load_catalog(settings).await?;
    let chapter = crate::cli::resolve_chapter(&catalog, reference)?.clone();
    read_chapter(settings, &catalog, &chapter, fresh, format).await
}

/// Run `next` (offset 1) or `prev` (offset -1) relative to the last read.
pub async fn run_relative(settings: &Settings, offset: isize) -> Result<()> {
    let catalog = crate::cli::load_catalog(settings).await?;
    let state = crate::state::ReaderState::load(&settings.state_path()?);

    let Some(last) = state.last_slug.as_deref() else {
        bail!("nothing read yet — start with 'folio read <chapter>'");
    };
    if catalog.get(last).is_none() {
        bail!("last read chapter '{last}' is not in the catalog anymore");
    }
    let Some(chapter) = catalog.neighbor(last, offset) else {
        if offset > 0 {
            bail!("already at the newest chapter");
        }
        bail!("already at the first chapter");
    };
    let chapter = chapter.clone();
    read_chapter(settings, &catalog, &chapter, false, ReadFormat::Pretty).await
}

async fn read_chapter(
    settings: &Settings,
    catalog: &Catalog,
    chapter: &Chapter,
    fresh: bool,
    format: ReadFormat,
) -> Result<()> {
    let bus = ProgressBus::default();
    let spinner = spawn_spinner(&bus);
    let (fetcher, mut state) = crate::cli::open_fetcher(settings, bus)?;

    let started = Instant::now();
    let result = fetcher.fetch_chapter(&chapter.slug, fresh).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Some((bar, task)) = spinner {
        bar.finish_and_clear();
        task.abort();
    }

    crate::cli::record_outcome(settings, &chapter.slug, &result, elapsed_ms);

    state.preferred_proxy = fetcher.preferred_proxy();
    let fetched = match result {
        Ok(fetched) => {
            state.last_slug = Some(chapter.slug.clone());
            crate::cli::save_state(settings, &state);
            fetched
        }
        Err(e) => {
            crate::cli::save_state(settings, &state);
            return Err(e.into());
        }
    };

    let text = html_to_text(&fetched.content);

    if output::is_json() || format == ReadFormat::Json {
        output::print_json(&serde_json::json!({
            "slug": fetched.slug,
            "title": fetched.title,
            "html": fetched.content,
            "text": text,
            "proxy": fetched.proxy,
            "from_cache": fetched.from_cache,
            "fetched_at": fetched.fetched_at,
            "attempts": fetched.attempts,
            "elapsed_ms": elapsed_ms,
        }));
        return Ok(());
    }

    if format == ReadFormat::Html {
        println!("{}", fetched.content);
        return Ok(());
    }

    let s = Styled::new();
    println!("{}", s.bold(&fetched.title));
    if !output::is_quiet() {
        let source = if fetched.from_cache {
            format!("cached copy, fetched {}", fetched.fetched_at.format("%Y-%m-%d %H:%M UTC"))
        } else {
            format!("via {}", fetched.proxy)
        };
        println!("{}", s.dim(&format!("{} \u{00b7} {source}", fetched.slug)));
    }
    println!();
    println!("{text}");

    if !output::is_quiet() {
        println!();
        let words = text.split_whitespace().count();
        let mut footer = format!("{words} words");
        if catalog.neighbor(&chapter.slug, -1).is_some() {
            footer.push_str(" \u{00b7} prev: folio prev");
        }
        if catalog.neighbor(&chapter.slug, 1).is_some() {
            footer.push_str(" \u{00b7} next: folio next");
        }
        println!("{}", s.dim(&footer));
    }

    Ok(())
}

/// Spinner that narrates pipeline events while a fetch runs. Skipped in
/// quiet and JSON modes.
pub(crate) fn spawn_spinner(
    bus: &ProgressBus,
) -> Option<(ProgressBar, tokio::task::JoinHandle<()>)> {
    if output::is_quiet() || output::is_json() {
        return None;
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("  {spinner} {msg}").unwrap());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar.set_message("fetching...");

    let mut rx = bus.subscribe();
    let bar_task = bar.clone();
    let task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.kind {
                FetchEventKind::CacheHit { .. } => {
                    bar_task.set_message("found in cache");
                }
                FetchEventKind::ProxyAttempt { proxy, attempt, .. } => {
                    let msg = if attempt == 1 {
                        format!("Connecting to source (via {proxy})...")
                    } else {
                        format!("Connecting to source (via {proxy}, attempt {attempt})...")
                    };
                    bar_task.set_message(msg);
                }
                FetchEventKind::ProxyFailed { proxy, .. } => {
                    bar_task.set_message(format!("{proxy} failed, rotating..."));
                }
                FetchEventKind::Extracted { .. } => {
                    bar_task.set_message("extracting chapter...");
                }
                FetchEventKind::Completed { .. } | FetchEventKind::Failed { .. } => break,
                _ => {}
            }
        }
    });

    Some((bar, task))
}
