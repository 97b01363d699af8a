//! iTunes Search API client

use serde::Deserialize;
use std::time::Duration;

use crate::config::LookupConfig;
use crate::error::LookupError;
use crate::lookup::{search_term, MetadataLookup, TrackMetadata};

const USER_AGENT: &str = concat!("square-savior/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    preview_url: Option<String>,
    artwork_url100: Option<String>,
}

/// Looks songs up through the public iTunes search endpoint
pub struct ItunesLookup {
    http_client: reqwest::Client,
    base_url: String,
    artwork_size: u32,
    country: Option<String>,
}

impl ItunesLookup {
    pub fn new(config: &LookupConfig) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            artwork_size: config.artwork_size,
            country: config.country.clone(),
        })
    }

    async fn search(&self, term: &str) -> Result<SearchResponse, LookupError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("term", term),
            ("media", "music"),
            ("limit", "1"),
            ("entity", "song"),
        ];
        if let Some(country) = &self.country {
            query.push(("country", country.as_str()));
        }

        tracing::debug!(term = %term, "Querying iTunes search");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))
    }
}

impl MetadataLookup for ItunesLookup {
    async fn resolve(&self, creator: &str, title: &str) -> Result<TrackMetadata, LookupError> {
        let term = search_term(creator, title);
        let response = self.search(&term).await?;

        let first = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::NotFound(term.clone()))?;

        let preview_url = first
            .preview_url
            .ok_or_else(|| LookupError::NotFound(term.clone()))?;
        let artwork_url = first
            .artwork_url100
            .map(|url| upscale_artwork(&url, self.artwork_size));

        tracing::debug!(term = %term, "Preview found");

        Ok(TrackMetadata {
            preview_url,
            artwork_url,
        })
    }
}

/// Swap the 100px artwork variant for a `size`px one
pub fn upscale_artwork(url: &str, size: u32) -> String {
    url.replace("100x100", &format!("{size}x{size}"))
}
