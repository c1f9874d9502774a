//! Settings: defaults, config file, environment overrides.
//!
//! Precedence, lowest to highest: built-in defaults, `~/.folio/config.json`
//! (or `--config`), `FOLIO_*` environment variables, command-line flags.
//! Flags are applied by the CLI layer after `load`.

use crate::catalog::CatalogSource;
use crate::fetch::proxy::{default_endpoints, ProxyEndpoint};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const DATA_DIR_NAME: &str = ".folio";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Series root the chapter slug is appended to. Always ends with `/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Relays tried in order when fetching.
    #[serde(default = "default_endpoints")]
    pub proxies: Vec<ProxyEndpoint>,

    /// Catalog location: a file path or an http(s) URL. Defaults to
    /// `catalog.json` in the data dir.
    #[serde(default)]
    pub catalog: Option<String>,

    /// Whether the catalog file lists newest chapters first.
    #[serde(default = "default_true")]
    pub catalog_newest_first: bool,

    /// Chapter cache bound before LRU eviction; 0 disables it.
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Relay responses smaller than this are treated as dead ends.
    #[serde(default = "default_min_document_bytes")]
    pub min_document_bytes: usize,

    /// Extracted bodies at or under this length are treated as dead ends.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Title selector chain override, tried in order. Unset uses the
    /// built-in breadcrumb-then-h1 chain.
    #[serde(default)]
    pub title_selectors: Option<Vec<String>>,

    /// Content selector chain override, tried in order.
    #[serde(default)]
    pub content_selectors: Option<Vec<String>>,

    /// Parallelism for bulk prefetch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Data directory override; defaults to `~/.folio`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://stonescape.xyz/series/shadow-slave/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_cache_entries() -> usize {
    2000
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_min_document_bytes() -> usize {
    500
}

fn default_min_content_chars() -> usize {
    100
}

fn default_concurrency() -> usize {
    2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            proxies: default_endpoints(),
            catalog: None,
            catalog_newest_first: true,
            max_cache_entries: default_max_cache_entries(),
            request_timeout_secs: default_timeout_secs(),
            min_document_bytes: default_min_document_bytes(),
            min_content_chars: default_min_content_chars(),
            title_selectors: None,
            content_selectors: None,
            concurrency: default_concurrency(),
            data_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the given config file (or the default location)
    /// and overlay `FOLIO_*` environment variables. An explicitly named
    /// file must exist; the default location is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("invalid config: {}", path.display()))?
            }
            None => match Self::default_config_path() {
                Some(path) if path.exists() => {
                    let data = fs::read_to_string(&path)
                        .with_context(|| format!("failed to read config: {}", path.display()))?;
                    serde_json::from_str(&data)
                        .with_context(|| format!("invalid config: {}", path.display()))?
                }
                _ => Self::default(),
            },
        };
        settings.apply_env_from(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Overlay environment variables via a lookup function.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("FOLIO_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("FOLIO_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("FOLIO_CATALOG") {
            self.catalog = Some(v);
        }
        if let Some(v) = get("FOLIO_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.request_timeout_secs = n,
                Err(_) => tracing::warn!("ignoring non-numeric FOLIO_TIMEOUT_SECS: {v}"),
            }
        }
        if let Some(v) = get("FOLIO_MAX_CACHE_ENTRIES") {
            match v.parse() {
                Ok(n) => self.max_cache_entries = n,
                Err(_) => tracing::warn!("ignoring non-numeric FOLIO_MAX_CACHE_ENTRIES: {v}"),
            }
        }
        if let Some(v) = get("FOLIO_CONCURRENCY") {
            match v.parse() {
                Ok(n) => self.concurrency = n,
                Err(_) => tracing::warn!("ignoring non-numeric FOLIO_CONCURRENCY: {v}"),
            }
        }
    }

    /// Normalize and validate. Run after all overlays are applied.
    pub fn finalize(mut self) -> Result<Self> {
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        let parsed = Url::parse(&self.base_url)
            .with_context(|| format!("base_url is not an absolute URL: {}", self.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("base_url must be http or https: {}", self.base_url);
        }
        if self.proxies.is_empty() {
            tracing::warn!("no relay endpoints configured; restoring the built-in list");
            self.proxies = default_endpoints();
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(self)
    }

    // ── paths ──────────────────────────────────────────────────────────

    /// Default config file location, `~/.folio/config.json`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DATA_DIR_NAME).join("config.json"))
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|h| h.join(DATA_DIR_NAME))
                .context("could not determine home directory; set data_dir or FOLIO_DATA_DIR"),
        }
    }

    /// Where chapter cache entries live.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("chapters"))
    }

    /// Reader state file.
    pub fn state_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("state.json"))
    }

    /// Fetch audit log.
    pub fn audit_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("audit.jsonl"))
    }

    /// Catalog location, honoring the override. A value starting with
    /// `http(s)://` is fetched over the network; anything else is a file
    /// path.
    pub fn catalog_source(&self) -> Result<CatalogSource> {
        match &self.catalog {
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => {
                Ok(CatalogSource::Remote(s.clone()))
            }
            Some(s) => Ok(CatalogSource::File(PathBuf::from(s))),
            None => Ok(CatalogSource::File(self.data_dir()?.join("catalog.json"))),
        }
    }
}
