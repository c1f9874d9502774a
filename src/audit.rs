//! Append-only JSONL log of fetch outcomes.
//!
//! One line per completed fetch (hit, network success, or failure), rotated
//! by size so the log never grows unbounded. Unparsable lines are skipped
//! on read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_ROTATIONS: u32 = 3;

/// How a fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    CacheHit,
    Fetched,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub slug: String,
    pub outcome: AuditOutcome,
    /// Relay that served the chapter, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Relay attempts made; 0 for cache hits.
    pub attempts: usize,
    pub elapsed_ms: u64,
    /// Characters of extracted content delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Size-rotated JSONL writer.
pub struct AuditLog {
    path: PathBuf,
    max_bytes: u64,
    max_rotations: u32,
}

impl AuditLog {
    pub fn new(path: PathBuf, max_bytes: u64, max_rotations: u32) -> Self {
        Self {
            path,
            max_bytes,
            max_rotations,
        }
    }

    pub fn with_defaults(path: PathBuf) -> Self {
        Self::new(path, DEFAULT_MAX_BYTES, DEFAULT_MAX_ROTATIONS)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, rotating first if the live file is full.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create audit dir: {}", parent.display()))?;
        }
        self.rotate_if_needed()?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open audit log: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append audit log: {}", self.path.display()))?;
        Ok(())
    }

    /// Last `n` records from the live file, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<AuditRecord>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Ok(Vec::new()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping bad audit line: {e}"),
            }
        }
        if records.len() > n {
            records.drain(..records.len() - n);
        }
        Ok(records)
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size < self.max_bytes {
            return Ok(());
        }

        let rotated = |i: u32| PathBuf::from(format!("{}.{i}", self.path.display()));
        let _ = fs::remove_file(rotated(self.max_rotations));
        for i in (1..self.max_rotations).rev() {
            let _ = fs::rename(rotated(i), rotated(i + 1));
        }
        fs::rename(&self.path, rotated(1))
            .with_context(|| format!("failed to rotate audit log: {}", self.path.display()))?;
        tracing::debug!("audit log rotated at {size} bytes");
        Ok(())
    }
}
