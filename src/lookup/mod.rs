//! Preview and artwork lookup
//!
//! Resolves a playable preview URL and artwork for a song from its creator
//! and title. Lookups are idempotent queries; the game keeps at most one in
//! flight per candidate.

pub mod itunes;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::LookupError;

pub use itunes::ItunesLookup;
pub use memory::MemoryLookup;

/// What a successful lookup yields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub preview_url: String,
    pub artwork_url: Option<String>,
}

/// Metadata source
pub trait MetadataLookup: Send + Sync + 'static {
    /// Resolve `creator` + `title`; a miss is [`LookupError::NotFound`]
    fn resolve(
        &self,
        creator: &str,
        title: &str,
    ) -> impl Future<Output = Result<TrackMetadata, LookupError>> + Send;
}

/// Search term sent for a song
pub fn search_term(creator: &str, title: &str) -> String {
    format!("{} {}", creator.trim(), title.trim())
}
