//! `folio fetch <chapters...>` — prefetch chapters into the cache.

use crate::cli::output::{self, Styled};
use crate::config::Settings;
use crate::progress::{FetchEventKind, ProgressBus};
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

/// Run the fetch command. `--all` prefetches the whole catalog; otherwise
/// each reference must resolve to one chapter.
pub async fn run(
    settings: &Settings,
    references: &[String],
    all: bool,
    fresh: bool,
    concurrency: Option<usize>,
) -> Result<()> {
    let catalog = crate::cli::load_catalog(settings).await?;

    let mut slugs: Vec<String> = if all {
        if catalog.is_empty() {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "requested": 0,
                    "fetched": 0,
                    "failed": 0,
                }));
            } else if !output::is_quiet() {
                eprintln!("  Catalog is empty.");
            }
            return Ok(());
        }
        catalog.iter().map(|c| c.slug.clone()).collect()
    } else {
        if references.is_empty() {
            bail!("name chapters to fetch, or pass --all");
        }
        let mut slugs = Vec::with_capacity(references.len());
        for reference in references {
            slugs.push(crate::cli::resolve_chapter(&catalog, reference)?.slug.clone());
        }
        slugs
    };

    let bus = ProgressBus::default();
    let (fetcher, mut state) = crate::cli::open_fetcher(settings, bus.clone())?;

    // Prefetching what is already cached is a no-op; drop it up front so
    // the progress bar counts real work.
    if !fresh {
        let mut pending = Vec::with_capacity(slugs.len());
        for slug in slugs {
            if !fetcher.is_cached(&slug).await {
                pending.push(slug);
            }
        }
        slugs = pending;
    }

    if slugs.is_empty() {
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "requested": 0,
                "fetched": 0,
                "failed": 0,
            }));
        } else if !output::is_quiet() {
            eprintln!("  Nothing to fetch — everything is already cached.");
        }
        return Ok(());
    }

    let bar = spawn_bar(&bus, slugs.len() as u64);
    let concurrency = concurrency.unwrap_or(settings.concurrency);
    let results = fetcher.fetch_many(&slugs, concurrency, fresh).await;

    if let Some((bar, task)) = bar {
        bar.finish_and_clear();
        task.abort();
    }

    state.preferred_proxy = fetcher.preferred_proxy();
    crate::cli::save_state(settings, &state);

    let mut fetched = 0usize;
    let mut hits = 0usize;
    let mut failures: Vec<(String, String)> = Vec::new();
    for (slug, result) in &results {
        let elapsed = result.as_ref().map(|c| c.elapsed_ms).unwrap_or(0);
        crate::cli::record_outcome(settings, slug, result, elapsed);
        match result {
            Ok(chapter) if chapter.from_cache => hits += 1,
            Ok(_) => fetched += 1,
            Err(e) => failures.push((slug.clone(), e.to_string())),
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "requested": results.len(),
            "fetched": fetched,
            "cache_hits": hits,
            "failed": failures.len(),
            "failures": failures
                .iter()
                .map(|(slug, error)| serde_json::json!({ "slug": slug, "error": error }))
                .collect::<Vec<_>>(),
        }));
    } else if !output::is_quiet() {
        let s = Styled::new();
        eprintln!(
            "  {} Fetched {fetched} chapter(s), {hits} already cached, {} failed.",
            if failures.is_empty() { s.ok_sym() } else { s.warn_sym() },
            failures.len()
        );
        for (slug, error) in failures.iter().take(10) {
            eprintln!("    {} {slug}: {error}", s.err_sym());
        }
        if failures.len() > 10 {
            eprintln!("    ... and {} more", failures.len() - 10);
        }
    }

    if !failures.is_empty() && fetched == 0 && hits == 0 {
        bail!("could not fetch any of the {} requested chapters", failures.len());
    }
    Ok(())
}

/// Progress bar counting finished chapters, fed from pipeline events.
fn spawn_bar(
    bus: &ProgressBus,
    total: u64,
) -> Option<(ProgressBar, tokio::task::JoinHandle<()>)> {
    if output::is_quiet() || output::is_json() {
        return None;
    }

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("  {bar:30} {pos}/{len} {msg}").unwrap(),
    );

    let mut rx = bus.subscribe();
    let bar_task = bar.clone();
    let task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.kind {
                FetchEventKind::Completed { slug, .. } => {
                    bar_task.set_message(slug);
                    bar_task.inc(1);
                }
                FetchEventKind::Failed { slug, .. } => {
                    bar_task.set_message(format!("{slug} failed"));
                    bar_task.inc(1);
                }
                _ => {}
            }
        }
    });

    Some((bar, task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_all_with_empty_catalog_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("catalog.json"), "[]").unwrap();

        let mut settings = Settings::default();
        settings.data_dir = Some(dir.path().to_path_buf());

        // Reports the empty catalog and stops; never an "already cached"
        // summary, never a cache open.
        run(&settings, &[], true, false, None).await.unwrap();
        assert!(!dir.path().join("chapters").exists());
    }
}
