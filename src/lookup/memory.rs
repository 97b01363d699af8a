//! In-memory lookup table, for offline play and tests

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Candidate;
use crate::error::LookupError;
use crate::lookup::{search_term, MetadataLookup, TrackMetadata};

/// Lookup answered from a fixed table
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    entries: Arc<Mutex<HashMap<String, TrackMetadata>>>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table answering every candidate with a synthetic preview
    pub fn covering(candidates: &[Candidate]) -> Self {
        let lookup = Self::new();
        for candidate in candidates {
            lookup.insert(
                &candidate.creator,
                &candidate.title,
                TrackMetadata {
                    preview_url: format!("memory://preview/{}", candidate.id),
                    artwork_url: Some(format!("memory://artwork/{}", candidate.id)),
                },
            );
        }
        lookup
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, creator: &str, title: &str, metadata: TrackMetadata) {
        self.entries.lock().insert(key(creator, title), metadata);
    }

    /// Number of resolve calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl MetadataLookup for MemoryLookup {
    async fn resolve(&self, creator: &str, title: &str) -> Result<TrackMetadata, LookupError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let found = self.entries.lock().get(&key(creator, title)).cloned();
        found.ok_or_else(|| LookupError::NotFound(search_term(creator, title)))
    }
}

fn key(creator: &str, title: &str) -> String {
    search_term(creator, title).to_lowercase()
}
