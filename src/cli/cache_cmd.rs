//! `folio cache` — inspect and clear the chapter cache.

use crate::cache::ChapterCache;
use crate::catalog::Resolution;
use crate::cli::output::{self, Styled};
use crate::config::Settings;
use anyhow::Result;

/// Show entry count and on-disk size.
pub fn run_stats(settings: &Settings) -> Result<()> {
    let cache = ChapterCache::open(settings.cache_dir()?, settings.max_cache_entries)?;
    let stats = cache.stats();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "dir": cache.dir(),
            "entries": stats.entries,
            "bytes": stats.bytes,
            "max_entries": settings.max_cache_entries,
        }));
        return Ok(());
    }

    println!("  Cache:   {}", cache.dir().display());
    match settings.max_cache_entries {
        0 => println!("  Entries: {} (no bound)", stats.entries),
        max => println!("  Entries: {} of {max} max", stats.entries),
    }
    println!("  Size:    {}", fmt_bytes(stats.bytes));
    Ok(())
}

/// Clear one chapter (resolved against the catalog when possible) or the
/// whole cache.
pub async fn run_clear(settings: &Settings, reference: Option<&str>) -> Result<()> {
    let mut cache = ChapterCache::open(settings.cache_dir()?, settings.max_cache_entries)?;
    let s = Styled::new();

    match reference {
        Some(reference) => {
            // Prefer catalog resolution; a raw slug still works without one.
            let slug = match crate::cli::load_catalog(settings).await {
                Ok(catalog) => match catalog.resolve(reference) {
                    Resolution::Found(chapter) => chapter.slug.clone(),
                    _ => reference.to_string(),
                },
                Err(_) => reference.to_string(),
            };

            let removed = cache.remove(&slug);
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "slug": slug,
                    "removed": removed,
                }));
            } else if removed {
                eprintln!("  {} Removed cached copy of {slug}.", s.ok_sym());
            } else {
                eprintln!("  {} No cached copy of {slug}.", s.warn_sym());
            }
        }
        None => {
            let removed = cache.clear();
            if output::is_json() {
                output::print_json(&serde_json::json!({ "removed": removed }));
            } else {
                eprintln!("  {} Cleared {removed} cached chapter(s).", s.ok_sym());
            }
        }
    }
    Ok(())
}

/// Human-readable byte size.
pub(crate) fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
