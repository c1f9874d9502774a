//! `folio status` — one-screen summary of configuration and stored data.

use crate::audit::AuditLog;
use crate::cache::ChapterCache;
use crate::cli::cache_cmd::fmt_bytes;
use crate::cli::output;
use crate::config::Settings;
use crate::state::ReaderState;
use anyhow::Result;

pub async fn run(settings: &Settings) -> Result<()> {
    let data_dir = settings.data_dir()?;
    let catalog = crate::cli::load_catalog(settings).await.ok();
    let cache = ChapterCache::open(settings.cache_dir()?, settings.max_cache_entries)?;
    let stats = cache.stats();
    let state = ReaderState::load(&settings.state_path()?);
    let recent = AuditLog::with_defaults(settings.audit_path()?)
        .tail(5)
        .unwrap_or_default();

    let next_relay = settings
        .proxies
        .get(state.preferred_proxy % settings.proxies.len().max(1))
        .map(|p| p.name.clone())
        .unwrap_or_default();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "base_url": settings.base_url,
            "data_dir": data_dir,
            "catalog": {
                "source": settings.catalog_source()?.to_string(),
                "chapters": catalog.as_ref().map(|c| c.len()),
            },
            "cache": {
                "entries": stats.entries,
                "bytes": stats.bytes,
                "max_entries": settings.max_cache_entries,
            },
            "relays": settings.proxies.iter().map(|p| &p.name).collect::<Vec<_>>(),
            "next_relay": next_relay,
            "last_read": state.last_slug,
            "recent": recent,
        }));
        return Ok(());
    }

    println!("folio status");
    println!("============");
    println!();
    println!("  Series:    {}", settings.base_url);
    println!("  Data dir:  {}", data_dir.display());
    match &catalog {
        Some(c) => println!("  Catalog:   {} chapters", c.len()),
        None => println!("  Catalog:   not found ({})", settings.catalog_source()?),
    }
    println!(
        "  Cache:     {} entries, {}",
        stats.entries,
        fmt_bytes(stats.bytes)
    );
    let relay_names: Vec<&str> = settings.proxies.iter().map(|p| p.name.as_str()).collect();
    println!(
        "  Relays:    {} (next fetch starts at {next_relay})",
        relay_names.join(", ")
    );
    match &state.last_slug {
        Some(slug) => println!("  Last read: {slug}"),
        None => println!("  Last read: nothing yet"),
    }

    if !recent.is_empty() {
        println!();
        println!("  Recent fetches:");
        for record in &recent {
            let outcome = match record.outcome {
                crate::audit::AuditOutcome::CacheHit => "cache hit",
                crate::audit::AuditOutcome::Fetched => "fetched",
                crate::audit::AuditOutcome::Failed => "FAILED",
            };
            let via = record
                .proxy
                .as_deref()
                .map(|p| format!("  via {p}"))
                .unwrap_or_default();
            println!(
                "    {}  {:<9} {}{via}  {}ms",
                record.timestamp.format("%Y-%m-%d %H:%M UTC"),
                outcome,
                record.slug,
                record.elapsed_ms
            );
        }
    }

    Ok(())
}
