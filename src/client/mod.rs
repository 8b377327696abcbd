//! Video API client abstraction
//!
//! The harvest loop only talks to [`VideoApi`]; the reqwest-backed YouTube
//! Data API implementation lives in [`youtube`].

pub mod youtube;

pub use youtube::YouTubeClient;

use crate::config::SearchConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Maximum ids accepted by one details request
pub const DETAILS_BATCH_LIMIT: usize = 50;

/// One search call: query text, fixed filters and an optional continuation token
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub page_token: Option<&'a str>,
    pub filters: &'a SearchConfig,
}

/// A page of search results reduced to what the harvester needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Video ids in result order (may contain repeats)
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Trait for video search backends
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage>;

    /// Fetch full details for the given ids; unknown ids are silently absent
    async fn details(&self, ids: &[String]) -> Result<Vec<VideoItem>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    pub video_id: Option<String>,
}

impl From<SearchListResponse> for SearchPage {
    fn from(response: SearchListResponse) -> Self {
        Self {
            video_ids: response
                .items
                .into_iter()
                .filter_map(|item| item.id.video_id)
                .filter(|id| !id.is_empty())
                .collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

/// Video resource as returned by the details endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    pub content_details: ContentDetails,
    #[serde(default)]
    pub statistics: VideoStatistics,
    pub recording_details: Option<RecordingDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    pub duration: String,
    pub definition: String,
    /// "true" or "false" as a string
    pub caption: String,
    pub licensed_content: Option<bool>,
}

/// Counts arrive as decimal strings and are hidden by some uploaders
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDetails {
    pub location_description: Option<String>,
}
