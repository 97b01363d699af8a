//! Session-wide artwork memo
//!
//! Filled opportunistically by metadata lookups, read when a candidate is
//! displayed or moved into the revealed list. Never evicted.

use dashmap::DashMap;
use std::sync::Arc;

use crate::catalog::{Candidate, CandidateId};

/// Shared artwork URL store keyed by candidate id
#[derive(Debug, Clone, Default)]
pub struct ArtworkCache {
    entries: Arc<DashMap<CandidateId, String>>,
}

impl ArtworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &CandidateId) -> Option<String> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Store artwork for `id`; a later put for the same id overwrites
    pub fn put(&self, id: CandidateId, artwork_url: impl Into<String>) {
        self.entries.insert(id, artwork_url.into());
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `candidate` with cached artwork applied, if any
    pub fn enrich(&self, candidate: &Candidate) -> Candidate {
        candidate.with_artwork(self.get(&candidate.id))
    }

    /// Candidates from `candidates` that have no cached artwork yet
    pub fn missing<'a>(&self, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
        candidates
            .iter()
            .filter(|candidate| !self.contains(&candidate.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_overwrite() {
        let cache = ArtworkCache::new();
        let id = CandidateId::from("a");
        assert!(cache.get(&id).is_none());

        cache.put(id.clone(), "first");
        assert_eq!(cache.get(&id).as_deref(), Some("first"));

        cache.put(id.clone(), "second");
        assert_eq!(cache.get(&id).as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ArtworkCache::new();
        let other = cache.clone();
        other.put(CandidateId::from("a"), "url");
        assert!(cache.contains(&CandidateId::from("a")));
    }

    #[test]
    fn test_enrich_and_missing() {
        let cache = ArtworkCache::new();
        let a = Candidate::new("a", "A", "X", 2000);
        let b = Candidate::new("b", "B", "Y", 2000);
        cache.put(a.id.clone(), "art-a");

        assert_eq!(cache.enrich(&a).artwork_url.as_deref(), Some("art-a"));
        assert!(cache.enrich(&b).artwork_url.is_none());

        let candidates = vec![a, b];
        let missing = cache.missing(&candidates);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id.as_str(), "b");
    }
}
