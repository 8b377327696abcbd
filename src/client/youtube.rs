use super::{
    SearchListResponse, SearchPage, SearchRequest, VideoApi, VideoItem, VideoListResponse,
    DETAILS_BATCH_LIMIT,
};
use crate::config::{ApiConfig, ApiKey};
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DETAIL_PARTS: &str = "snippet,statistics,contentDetails,recordingDetails";

/// Error reasons that mean the daily or per-minute quota is spent
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

/// YouTube Data API v3 client
pub struct YouTubeClient {
    base_url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

impl YouTubeClient {
    pub fn new(config: &ApiConfig, api_key: ApiKey) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse_with_params(&format!("{}/{}", self.base_url, resource), params)
            .map_err(|e| HarvestError::Config(format!("Invalid API base URL: {}", e)))?;
        url.query_pairs_mut().append_pair("key", self.api_key.expose());
        Ok(url)
    }

    /// Build the search URL for a request
    pub fn search_url(&self, request: &SearchRequest<'_>) -> Result<Url> {
        let filters = request.filters;
        let page_size = filters.page_size.to_string();
        let mut params = vec![
            ("part", "id"),
            ("q", request.query),
            ("type", "video"),
            ("videoCategoryId", filters.category_id.as_str()),
            ("regionCode", filters.region_code.as_str()),
            ("relevanceLanguage", filters.relevance_language.as_str()),
            ("safeSearch", filters.safe_search.as_str()),
            ("location", filters.location.as_str()),
            ("locationRadius", filters.location_radius.as_str()),
            ("videoDuration", filters.video_duration.as_str()),
            ("order", filters.order.as_str()),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = request.page_token {
            params.push(("pageToken", token));
        }

        self.endpoint("search", &params)
    }

    /// Build the details URL for one batch of ids
    pub fn details_url(&self, ids: &[String]) -> Result<Url> {
        let joined = ids.join(",");
        self.endpoint("videos", &[("part", DETAIL_PARTS), ("id", joined.as_str())])
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url.path());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            HarvestError::UnexpectedResponse(format!("{} (body: {})", e, truncate(&body, 200)))
        })
    }
}

#[async_trait]
impl VideoApi for YouTubeClient {
    async fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage> {
        let url = self.search_url(request)?;
        let response: SearchListResponse = self.get_json(url).await?;
        let page = SearchPage::from(response);

        debug!(
            "🔍 Search '{}' returned {} ids (next page: {})",
            request.query,
            page.video_ids.len(),
            page.next_page_token.is_some()
        );
        Ok(page)
    }

    async fn details(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        let mut items = Vec::with_capacity(ids.len());

        for batch in ids.chunks(DETAILS_BATCH_LIMIT) {
            let url = self.details_url(batch)?;
            let response: VideoListResponse = self.get_json(url).await?;
            debug!("📥 Details for {} ids returned {} items", batch.len(), response.items.len());
            items.extend(response.items);
        }

        Ok(items)
    }
}

/// Map an API error response onto the error taxonomy
pub(crate) fn parse_error(status: u16, body: &str) -> HarvestError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let quota = envelope
                .error
                .errors
                .iter()
                .any(|detail| QUOTA_REASONS.contains(&detail.reason.as_str()));

            if quota {
                HarvestError::QuotaExceeded(envelope.error.message)
            } else {
                HarvestError::Api {
                    status,
                    message: envelope.error.message,
                }
            }
        }
        Err(_) => HarvestError::Api {
            status,
            message: truncate(body, 200).to_string(),
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
