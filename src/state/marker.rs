use super::{read_document, KeyValueStore};
use crate::config::CorruptStatePolicy;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const LAST_KEYWORD_KEY: &str = "last_keyword";

/// Persisted resume marker contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkerEntry {
    #[serde(rename = "lastKeyword")]
    pub keyword: String,

    /// Absent in markers written by older tooling
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Names the keyword a batch was working on when it last stopped
#[derive(Clone)]
pub struct ResumeMarker {
    store: Arc<dyn KeyValueStore>,
    policy: CorruptStatePolicy,
}

impl ResumeMarker {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: CorruptStatePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn get(&self) -> Result<Option<String>> {
        Ok(self.get_entry().await?.map(|entry| entry.keyword))
    }

    pub async fn get_entry(&self) -> Result<Option<MarkerEntry>> {
        read_document(self.store.as_ref(), LAST_KEYWORD_KEY, self.policy).await
    }

    pub async fn set(&self, keyword: &str) -> Result<()> {
        let entry = MarkerEntry {
            keyword: keyword.to_string(),
            updated_at: Some(Utc::now()),
        };
        self.store
            .set(LAST_KEYWORD_KEY, &serde_json::to_string(&entry)?)
            .await?;
        info!("📍 Saved resume marker: {}", keyword);
        Ok(())
    }

    pub async fn clear(&self) -> Result<bool> {
        let removed = self.store.delete(LAST_KEYWORD_KEY).await?;
        if removed {
            info!("🏁 Resume marker cleared");
        }
        Ok(removed)
    }
}
