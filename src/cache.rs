//! Reference graph cache (`$refs`).
//!
//! Keyed by canonical document location (pointer paths ignored), scoped to
//! one resolve/dereference/bundle operation — there is no process-wide
//! cache. Guarantees:
//!
//! - at most one entry per canonical location; entries are never mutated or
//!   evicted within the operation,
//! - at most one in-flight load per location even under concurrent
//!   discovery: later requesters await the first load instead of issuing
//!   duplicate I/O (single-flight coalescing via a per-entry `OnceCell`),
//! - `paths()` reflects insertion order of *first* discovery, independent
//!   of completion order of concurrent loads.

use std::future::Future;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::RefResult;
use crate::graph::NodeId;
use crate::location::Location;

/// One loaded document: canonical location, the raw bytes the reader
/// produced, the parsed root node, and the content-type hint used for
/// parser dispatch. Immutable once cached.
#[derive(Debug, Clone)]
pub struct Document {
    pub location: Location,
    pub bytes: Vec<u8>,
    pub root: NodeId,
    pub content_type: Option<String>,
}

type Entry = Arc<OnceCell<Arc<Document>>>;

/// Per-operation cache of loaded documents.
#[derive(Debug, Default)]
pub struct RefCache {
    entries: Mutex<IndexMap<Location, Entry>>,
}

impl RefCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the document for a canonical location, loading it through
    /// `load` on first request. Idempotent: a cache hit returns the stored
    /// document without I/O; concurrent misses coalesce onto one load.
    pub async fn get_or_load<F, Fut>(&self, location: &Location, load: F) -> RefResult<Arc<Document>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefResult<Document>>,
    {
        let key = location.document();
        let cell = {
            let mut entries = self.entries.lock().expect("cache index poisoned");
            entries.entry(key.clone()).or_default().clone()
        };
        let doc = cell
            .get_or_try_init(|| async {
                debug!(location = %key, "loading document");
                load().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(doc))
    }

    /// The document for a location, if it finished loading.
    pub fn get(&self, location: &Location) -> Option<Arc<Document>> {
        let entries = self.entries.lock().expect("cache index poisoned");
        entries
            .get(&location.document())
            .and_then(|cell| cell.get())
            .cloned()
    }

    /// Canonical absolute locations of all cached documents, in
    /// first-discovery order.
    pub fn paths(&self) -> Vec<String> {
        let entries = self.entries.lock().expect("cache index poisoned");
        entries
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(loc, _)| loc.display_path())
            .collect()
    }

    /// Cached documents in first-discovery order.
    pub fn documents(&self) -> Vec<Arc<Document>> {
        let entries = self.entries.lock().expect("cache index poisoned");
        entries
            .values()
            .filter_map(|cell| cell.get())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("cache index poisoned");
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
