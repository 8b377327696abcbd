use super::{read_document, KeyValueStore};
use crate::config::CorruptStatePolicy;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const CURSOR_PREFIX: &str = "next_page_token_";

#[derive(Debug, Serialize, Deserialize)]
struct CursorDocument {
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Per-keyword continuation tokens, one persisted entry per keyword
#[derive(Clone)]
pub struct CursorStore {
    store: Arc<dyn KeyValueStore>,
    policy: CorruptStatePolicy,
}

impl CursorStore {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: CorruptStatePolicy) -> Self {
        Self { store, policy }
    }

    fn key_for(keyword: &str) -> String {
        format!("{}{}", CURSOR_PREFIX, keyword)
    }

    pub async fn get(&self, keyword: &str) -> Result<Option<String>> {
        let doc: Option<CursorDocument> =
            read_document(self.store.as_ref(), &Self::key_for(keyword), self.policy).await?;
        Ok(doc
            .and_then(|d| d.next_page_token)
            .filter(|token| !token.is_empty()))
    }

    pub async fn set(&self, keyword: &str, token: &str) -> Result<()> {
        let doc = CursorDocument {
            next_page_token: Some(token.to_string()),
        };
        self.store
            .set(&Self::key_for(keyword), &serde_json::to_string(&doc)?)
            .await?;
        info!("🔖 Saved next page token for {}: {}", keyword, token);
        Ok(())
    }

    /// Remove the keyword's cursor; returns false when none existed
    pub async fn clear(&self, keyword: &str) -> Result<bool> {
        let removed = self.store.delete(&Self::key_for(keyword)).await?;
        if removed {
            info!("🧹 Removed next page token for {}", keyword);
        }
        Ok(removed)
    }

    /// Keywords that still have unexhausted pages
    pub async fn pending(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(CURSOR_PREFIX).map(str::to_string))
            .collect())
    }
}
