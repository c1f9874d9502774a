//! Environment readiness check.

use crate::cache::ChapterCache;
use crate::config::Settings;
use crate::fetch::client::HttpClient;
use anyhow::Result;
use std::fs;

/// Check local files and probe each relay against the series index.
pub async fn run(settings: &Settings) -> Result<()> {
    println!("Folio Doctor");
    println!("============");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Data directory
    let data_dir_ok = match settings.data_dir() {
        Ok(dir) => match fs::create_dir_all(&dir) {
            Ok(()) => {
                println!("[OK] Data directory writable: {}", dir.display());
                true
            }
            Err(e) => {
                println!("[!!] Data directory not writable: {} ({e})", dir.display());
                false
            }
        },
        Err(e) => {
            println!("[!!] No data directory: {e}");
            false
        }
    };

    // Config file
    match Settings::default_config_path() {
        Some(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
        _ => println!("[OK] No config file, using defaults"),
    }

    // Catalog
    let catalog_ok = match crate::cli::load_catalog(settings).await {
        Ok(catalog) => {
            println!("[OK] Catalog found: {} chapters", catalog.len());
            true
        }
        Err(e) => {
            println!("[!!] {e:#}");
            false
        }
    };

    // Cache
    match settings
        .cache_dir()
        .and_then(|dir| ChapterCache::open(dir, settings.max_cache_entries))
    {
        Ok(cache) => {
            let stats = cache.stats();
            println!("[OK] Chapter cache: {} entries", stats.entries);
        }
        Err(e) => println!("[!!] Chapter cache unusable: {e:#}"),
    }

    // Relays, probed against the series index page.
    println!();
    let client = HttpClient::new(settings.request_timeout_secs);
    let mut relay_ok = false;
    for proxy in &settings.proxies {
        let request = proxy.request_url(&settings.base_url);
        match client.get_text(&request).await {
            Ok(resp) if resp.is_success() => match proxy.unwrap_body(&resp.body) {
                Ok(document) if document.len() >= settings.min_document_bytes => {
                    println!(
                        "[OK] Relay {} reachable ({} bytes)",
                        proxy.name,
                        document.len()
                    );
                    relay_ok = true;
                }
                Ok(document) => println!(
                    "[!!] Relay {} answered but returned a stub ({} bytes)",
                    proxy.name,
                    document.len()
                ),
                Err(e) => println!("[!!] Relay {} envelope broken: {e}", proxy.name),
            },
            Ok(resp) => println!("[!!] Relay {} returned HTTP {}", proxy.name, resp.status),
            Err(e) => println!("[!!] Relay {} unreachable: {e}", proxy.name),
        }
    }

    println!();
    let ready = data_dir_ok && catalog_ok && relay_ok;
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        if !catalog_ok {
            println!("  Save the chapter list to the catalog path shown above.");
        }
        if !relay_ok {
            println!("  No relay could reach the series. Check connectivity or add relays to the config.");
        }
    }

    Ok(())
}
