//! Persistent reader state.
//!
//! Two facts survive between runs: which relay served the last successful
//! fetch (so the next fetch starts there instead of at the top of the list)
//! and which chapter was read last (so `next`/`prev` can move relative to
//! it). State is advisory; a missing or corrupt file resets to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderState {
    /// Index into the configured relay list of the last relay that worked.
    #[serde(default)]
    pub preferred_proxy: usize,
    /// Slug of the most recently read chapter.
    #[serde(default)]
    pub last_slug: Option<String>,
}

impl ReaderState {
    /// Load state from disk. Absent or unparsable state is not an error;
    /// it just means starting fresh.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("state file unreadable ({e}); starting fresh");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Write state to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state dir: {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write state: {}", path.display()))?;
        Ok(())
    }
}
