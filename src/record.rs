use crate::client::VideoItem;
use serde::Serialize;
use tracing::debug;

/// Rendered in place of any field the API did not return
pub const UNKNOWN: &str = "N/A";

/// Column order of the output file
pub const COLUMNS: [&str; 15] = [
    "Title",
    "Description",
    "Tags",
    "Channel ID",
    "Channel",
    "Location",
    "Duration",
    "Definition",
    "Caption",
    "Licensed Content",
    "Views",
    "Likes",
    "Comments",
    "Published At",
    "Keyword",
];

/// Flattened metadata for one harvested video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub channel_id: String,
    pub channel: String,
    pub location: Option<String>,
    /// ISO 8601 duration as returned by the API, e.g. `PT4M13S`
    pub duration: String,
    pub definition: String,
    pub caption: String,
    pub licensed_content: Option<bool>,
    /// Counts exactly as the API returned them
    pub views: Option<String>,
    pub likes: Option<String>,
    pub comments: Option<String>,
    pub published_at: String,
    pub keyword: String,
}

impl ResultRecord {
    pub fn from_item(item: VideoItem, keyword: &str) -> Self {
        let VideoItem {
            id,
            snippet,
            content_details,
            statistics,
            recording_details,
        } = item;

        Self {
            video_id: id,
            title: snippet.title,
            description: snippet.description,
            tags: snippet.tags,
            channel_id: snippet.channel_id,
            channel: snippet.channel_title,
            location: recording_details
                .and_then(|r| r.location_description)
                .filter(|l| !l.is_empty()),
            duration: content_details.duration,
            definition: content_details.definition,
            caption: content_details.caption,
            licensed_content: content_details.licensed_content,
            views: parse_count(statistics.view_count),
            likes: parse_count(statistics.like_count),
            comments: parse_count(statistics.comment_count),
            published_at: snippet.published_at,
            keyword: keyword.to_string(),
        }
    }

    /// Render the record as one output row, in [`COLUMNS`] order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.description.clone(),
            serde_json::to_string(&self.tags).unwrap_or_else(|_| "[]".to_string()),
            self.channel_id.clone(),
            self.channel.clone(),
            or_unknown(self.location.as_ref()),
            self.duration.clone(),
            self.definition.clone(),
            self.caption.clone(),
            or_unknown(self.licensed_content.as_ref()),
            or_unknown(self.views.as_ref()),
            or_unknown(self.likes.as_ref()),
            or_unknown(self.comments.as_ref()),
            self.published_at.clone(),
            self.keyword.clone(),
        ]
    }
}

fn parse_count(raw: Option<String>) -> Option<String> {
    let value = raw?.trim().to_string();
    if value.is_empty() {
        return None;
    }
    if value.parse::<u64>().is_err() {
        debug!("Keeping non-numeric count as returned: {}", value);
    }
    Some(value)
}

fn or_unknown<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| UNKNOWN.to_string(), ToString::to_string)
}
