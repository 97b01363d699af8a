//! Candidate records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, globally unique candidate key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CandidateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A song eligible for a round
///
/// Identity is `id`; everything else is display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(rename = "youtubeId", alias = "id")]
    pub id: CandidateId,
    pub title: String,
    #[serde(rename = "artist", alias = "creator")]
    pub creator: String,
    pub year: u16,
    #[serde(default, alias = "artwork", skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl Candidate {
    pub fn new(
        id: impl Into<CandidateId>,
        title: impl Into<String>,
        creator: impl Into<String>,
        year: u16,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            creator: creator.into(),
            year,
            artwork_url: None,
            preview_url: None,
        }
    }

    /// Copy of this candidate carrying `artwork_url` when one is known
    pub fn with_artwork(&self, artwork_url: Option<String>) -> Self {
        let mut enriched = self.clone();
        if artwork_url.is_some() {
            enriched.artwork_url = artwork_url;
        }
        enriched
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Candidate {}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.creator, self.title, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_catalog_entry() {
        let json = r#"{"youtubeId":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","artist":"Rick Astley","year":1987}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(candidate.creator, "Rick Astley");
        assert_eq!(candidate.year, 1987);
        assert!(candidate.artwork_url.is_none());
    }

    #[test]
    fn test_accepts_alternate_field_names() {
        let json = r#"{"id":"a1","title":"T","creator":"C","year":2001,"artwork":"http://img"}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.id, CandidateId::from("a1"));
        assert_eq!(candidate.artwork_url.as_deref(), Some("http://img"));
    }

    #[test]
    fn test_identity_is_id_only() {
        let a = Candidate::new("x", "One", "Band", 2000);
        let b = Candidate::new("x", "Other title", "Other band", 1990);
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_artwork_keeps_existing_when_absent() {
        let mut candidate = Candidate::new("x", "One", "Band", 2000);
        candidate.artwork_url = Some("old".into());
        assert_eq!(candidate.with_artwork(None).artwork_url.as_deref(), Some("old"));
        assert_eq!(
            candidate.with_artwork(Some("new".into())).artwork_url.as_deref(),
            Some("new")
        );
    }
}
