use super::{read_document, KeyValueStore};
use crate::config::CorruptStatePolicy;
use crate::error::Result;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

const VIDEO_IDS_KEY: &str = "video_ids";

/// Persisted set of video ids that have already been collected
#[derive(Clone)]
pub struct IdentifierStore {
    store: Arc<dyn KeyValueStore>,
    policy: CorruptStatePolicy,
}

impl IdentifierStore {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: CorruptStatePolicy) -> Self {
        Self { store, policy }
    }

    /// Load the full set; empty when nothing has been persisted yet
    pub async fn load(&self) -> Result<HashSet<String>> {
        let ids: Option<Vec<String>> =
            read_document(self.store.as_ref(), VIDEO_IDS_KEY, self.policy).await?;
        Ok(ids.unwrap_or_default().into_iter().collect())
    }

    /// Union `new_ids` into the persisted set and write the whole set back.
    /// Returns the size of the stored set.
    pub async fn save<I, S>(&self, new_ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged: BTreeSet<String> = self.load().await?.into_iter().collect();
        let before = merged.len();
        merged.extend(new_ids.into_iter().map(Into::into));

        let json = serde_json::to_string(&merged)?;
        self.store.set(VIDEO_IDS_KEY, &json).await?;

        debug!("📋 Identifier set: {} -> {} ids", before, merged.len());
        Ok(merged.len())
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.load().await?.contains(id))
    }
}
