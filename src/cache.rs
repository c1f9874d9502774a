//! Chapter cache — one JSON entry per chapter on the filesystem.
//!
//! ## Eviction
//!
//! Entries never expire by age: a fetched chapter stays readable offline
//! until it is explicitly cleared or the cache hits `max_entries`, at which
//! point the least-recently-read entry is evicted. Corrupt entries are
//! removed on read and the caller falls back to the network.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A cached chapter: the extracted pair plus provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Chapter slug the entry is keyed by.
    pub slug: String,
    /// Extracted title.
    pub title: String,
    /// Extracted body, verbatim inner HTML.
    pub content: String,
    /// When the chapter was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Name of the relay that served it.
    pub proxy: String,
}

/// Aggregate cache figures for `status` and `cache stats`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

struct IndexEntry {
    path: PathBuf,
    bytes: u64,
    /// For LRU ordering; seeded from file mtime on open so eviction order
    /// survives restarts.
    last_accessed: SystemTime,
}

/// Filesystem-backed chapter store with an in-memory index.
pub struct ChapterCache {
    dir: PathBuf,
    index: HashMap<String, IndexEntry>,
    /// Entry cap before LRU eviction; 0 disables the bound.
    max_entries: usize,
}

impl ChapterCache {
    /// Open (or create) a cache directory and rebuild the index from the
    /// `*.json` entries already on disk.
    pub fn open(dir: PathBuf, max_entries: usize) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;

        let mut index = HashMap::new();
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let meta = entry.metadata().ok();
                let bytes = meta.as_ref().map(|m| m.len()).unwrap_or(0);
                let last_accessed = meta
                    .and_then(|m| m.modified().ok())
                    .unwrap_or_else(SystemTime::now);
                index.insert(
                    stem.to_string(),
                    IndexEntry {
                        path,
                        bytes,
                        last_accessed,
                    },
                );
            }
        }

        tracing::debug!(
            "chapter cache opened: {} entries under {}",
            index.len(),
            dir.display()
        );

        Ok(Self {
            dir,
            index,
            max_entries,
        })
    }

    /// Load a cached chapter. A corrupt or unreadable entry is removed and
    /// reported as a miss so the caller refetches.
    pub fn get(&mut self, slug: &str) -> Option<CacheEntry> {
        let key = cache_key(slug);
        let entry = self.index.get_mut(&key)?;

        let data = match fs::read(&entry.path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("cache entry for {slug} unreadable ({e}); dropping");
                let path = entry.path.clone();
                self.index.remove(&key);
                let _ = fs::remove_file(path);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&data) {
            Ok(parsed) => {
                entry.last_accessed = SystemTime::now();
                Some(parsed)
            }
            Err(e) => {
                tracing::warn!("cache entry for {slug} corrupt ({e}); dropping");
                let path = entry.path.clone();
                self.index.remove(&key);
                let _ = fs::remove_file(path);
                None
            }
        }
    }

    /// Whether a chapter is cached, without touching LRU order.
    pub fn contains(&self, slug: &str) -> bool {
        self.index.contains_key(&cache_key(slug))
    }

    /// Store a chapter, evicting the least-recently-read entry first when
    /// the cache is at capacity.
    pub fn put(&mut self, entry: &CacheEntry) -> Result<PathBuf> {
        let key = cache_key(&entry.slug);
        if self.max_entries > 0
            && self.index.len() >= self.max_entries
            && !self.index.contains_key(&key)
        {
            self.evict_lru();
        }

        let path = self.dir.join(format!("{key}.json"));
        let data = serde_json::to_vec(entry)?;
        fs::write(&path, &data)
            .with_context(|| format!("failed to write cache entry: {}", path.display()))?;

        self.index.insert(
            key,
            IndexEntry {
                path: path.clone(),
                bytes: data.len() as u64,
                last_accessed: SystemTime::now(),
            },
        );

        Ok(path)
    }

    /// Remove one cached chapter. Returns whether an entry existed.
    pub fn remove(&mut self, slug: &str) -> bool {
        match self.index.remove(&cache_key(slug)) {
            Some(entry) => {
                let _ = fs::remove_file(&entry.path);
                true
            }
            None => false,
        }
    }

    /// Remove every cached chapter, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.index.len();
        for (_, entry) in self.index.drain() {
            let _ = fs::remove_file(&entry.path);
        }
        n
    }

    /// Entry count and on-disk size.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.index.len(),
            bytes: self.index.values().map(|e| e.bytes).sum(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Cache directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn evict_lru(&mut self) {
        if let Some(lru_key) = self
            .index
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            tracing::info!("cache full; evicting least-recently-read entry: {lru_key}");
            if let Some(entry) = self.index.remove(&lru_key) {
                let _ = fs::remove_file(&entry.path);
            }
        }
    }
}

/// Filename-safe form of a slug. Slugs are hyphenated ASCII in practice;
/// anything else maps to `_`.
fn cache_key(slug: &str) -> String {
    slug.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slug: &str) -> CacheEntry {
        CacheEntry {
            slug: slug.to_string(),
            title: format!("Title of {slug}"),
            content: "<p>Some prose long enough to look real.</p>".to_string(),
            fetched_at: Utc::now(),
            proxy: "AllOrigins".to_string(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();

        let e = entry("ch-1");
        let path = cache.put(&e).unwrap();
        assert!(path.exists());

        let loaded = cache.get("ch-1").unwrap();
        assert_eq!(loaded, e);
    }

    #[test]
    fn test_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();
        assert!(cache.get("nope").is_none());
        assert!(!cache.contains("nope"));
    }

    #[test]
    fn test_corrupt_entry_dropped_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();

        let path = cache.put(&entry("ch-2")).unwrap();
        fs::write(&path, b"{not json").unwrap();

        assert!(cache.get("ch-2").is_none());
        assert!(!path.exists(), "corrupt file should be deleted");
        assert!(!cache.contains("ch-2"));
    }

    #[test]
    fn test_index_rebuilt_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();
            cache.put(&entry("ch-3")).unwrap();
        }
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("ch-3").unwrap().slug, "ch-3");
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 2).unwrap();

        cache.put(&entry("a")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        cache.put(&entry("b")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));

        // Reading "a" makes "b" the LRU entry.
        let _ = cache.get("a");
        std::thread::sleep(std::time::Duration::from_millis(10));

        cache.put(&entry("c")).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_clear_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();

        cache.put(&entry("x")).unwrap();
        cache.put(&entry("y")).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.bytes > 0);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().bytes, 0);
    }

    #[test]
    fn test_awkward_slug_gets_safe_filename() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 0).unwrap();

        let e = entry("weird/slug:v2");
        let path = cache.put(&e).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("weird_slug_v2.json")
        );
        assert_eq!(cache.get("weird/slug:v2").unwrap().slug, "weird/slug:v2");
    }

    #[test]
    fn test_put_same_slug_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ChapterCache::open(dir.path().to_path_buf(), 2).unwrap();

        cache.put(&entry("a")).unwrap();
        let mut updated = entry("a");
        updated.title = "Revised".to_string();
        cache.put(&updated).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().title, "Revised");
    }
}
