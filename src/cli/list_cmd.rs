//! `folio list` — browse the chapter catalog.

use crate::cache::ChapterCache;
use crate::cli::output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command. With a query, filters like the reader's search
/// box: case-insensitive substring over title and slug.
pub async fn run(settings: &Settings, query: Option<&str>, cached_only: bool) -> Result<()> {
    let catalog = crate::cli::load_catalog(settings).await?;
    let cache = ChapterCache::open(settings.cache_dir()?, settings.max_cache_entries)?;

    let matches = match query {
        Some(q) => catalog.search(q),
        None => catalog.iter().collect(),
    };
    let rows: Vec<_> = matches
        .into_iter()
        .filter(|c| !cached_only || cache.contains(&c.slug))
        .collect();

    if output::is_json() {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|c| {
                serde_json::json!({
                    "slug": c.slug,
                    "title": c.title,
                    "position": catalog.position(&c.slug),
                    "cached": cache.contains(&c.slug),
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "total": catalog.len(),
            "shown": items.len(),
            "chapters": items,
        }));
        return Ok(());
    }

    if rows.is_empty() {
        if !output::is_quiet() {
            match query {
                Some(q) => eprintln!("  No chapters match '{q}'."),
                None => eprintln!("  Catalog is empty."),
            }
        }
        return Ok(());
    }

    for chapter in &rows {
        let marker = if cache.contains(&chapter.slug) { "*" } else { " " };
        let pos = catalog
            .position(&chapter.slug)
            .map(|p| (p + 1).to_string())
            .unwrap_or_default();
        println!("  {marker} {pos:>5}  {:<28} {}", catalog.short_label(chapter), chapter.title);
    }

    if !output::is_quiet() {
        eprintln!();
        eprintln!(
            "  {} of {} chapters ('*' = cached). Read one with: folio read <slug>",
            rows.len(),
            catalog.len()
        );
    }

    Ok(())
}
