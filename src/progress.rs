// Copyright 2026 Folio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fetch progress events.
//!
//! Every pipeline run emits a sequence of [`FetchEvent`]s over a broadcast
//! channel: started, per-relay attempts and failures, extraction, caching,
//! then completed or failed. Subscribers (the CLI spinner, the audit log)
//! observe the same stream; nothing in the pipeline blocks on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// One step of a fetch, stamped with the request it belongs to and a
/// monotonic sequence number for ordering across interleaved requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEvent {
    pub request_id: Uuid,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: FetchEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FetchEventKind {
    Started {
        slug: String,
    },
    CacheHit {
        slug: String,
    },
    ProxyAttempt {
        slug: String,
        proxy: String,
        attempt: usize,
    },
    ProxyFailed {
        slug: String,
        proxy: String,
        reason: String,
    },
    Extracted {
        slug: String,
        title: String,
        content_chars: usize,
    },
    Cached {
        slug: String,
    },
    Completed {
        slug: String,
        proxy: String,
        from_cache: bool,
        elapsed_ms: u64,
    },
    Failed {
        slug: String,
        error: String,
    },
    Warning {
        slug: String,
        message: String,
    },
}

impl FetchEventKind {
    /// Slug the event is about.
    pub fn slug(&self) -> &str {
        match self {
            Self::Started { slug }
            | Self::CacheHit { slug }
            | Self::ProxyAttempt { slug, .. }
            | Self::ProxyFailed { slug, .. }
            | Self::Extracted { slug, .. }
            | Self::Cached { slug }
            | Self::Completed { slug, .. }
            | Self::Failed { slug, .. }
            | Self::Warning { slug, .. } => slug,
        }
    }
}

/// Broadcast bus the pipeline publishes on. Cheap to clone; all clones
/// share one sequence counter.
#[derive(Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<FetchEvent>,
    seq: Arc<AtomicU64>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Send errors mean no subscriber is listening,
    /// which is fine.
    pub fn emit(&self, request_id: Uuid, kind: FetchEventKind) {
        let event = FetchEvent {
            request_id,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            kind,
        };
        tracing::trace!(?event.request_id, event.seq, "progress event");
        let _ = self.tx.send(event);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}
