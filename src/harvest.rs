use crate::client::{SearchRequest, VideoApi};
use crate::config::{Config, SearchConfig};
use crate::error::{HarvestError, Result};
use crate::record::ResultRecord;
use crate::sink::RecordSink;
use crate::state::HarvestState;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of processing one search page
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// More results are available behind this token
    NextPage(String),
    /// The API reported no further pages
    Exhausted,
}

/// Counters for one keyword within one run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeywordStats {
    pub pages: u32,
    pub ids_seen: usize,
    pub new_records: usize,
}

/// How a keyword's harvest ended
#[derive(Debug)]
pub enum KeywordOutcome {
    /// All pages consumed; the keyword's cursor was cleared
    Exhausted(KeywordStats),
    /// Stopped at the per-run page cap; the cursor is kept for the next run
    PageCapReached(KeywordStats),
    /// A failure stopped the keyword; the resume marker names it
    Interrupted {
        stats: KeywordStats,
        error: HarvestError,
    },
}

impl KeywordOutcome {
    pub fn stats(&self) -> &KeywordStats {
        match self {
            KeywordOutcome::Exhausted(stats) | KeywordOutcome::PageCapReached(stats) => stats,
            KeywordOutcome::Interrupted { stats, .. } => stats,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, KeywordOutcome::Interrupted { .. })
    }
}

enum Finish {
    Exhausted,
    PageCapReached,
}

/// Drives the search -> dedup -> details -> persist loop for one keyword at a time
pub struct Harvester<S: RecordSink> {
    api: Arc<dyn VideoApi>,
    state: HarvestState,
    sink: S,
    search: SearchConfig,
    max_pages: u32,
}

impl<S: RecordSink> Harvester<S> {
    pub fn new(api: Arc<dyn VideoApi>, state: HarvestState, sink: S, config: &Config) -> Self {
        Self {
            api,
            state,
            sink,
            search: config.search.clone(),
            max_pages: config.harvest.max_pages_per_keyword,
        }
    }

    pub fn state(&self) -> &HarvestState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Harvest one keyword until exhaustion, the page cap, or a failure.
    ///
    /// Failures never propagate: the resume marker is set to `keyword` and the
    /// error is returned inside [`KeywordOutcome::Interrupted`].
    pub async fn harvest_keyword(&mut self, keyword: &str) -> KeywordOutcome {
        let mut stats = KeywordStats::default();

        match self.run_pages(keyword, &mut stats).await {
            Ok(Finish::Exhausted) => {
                info!(
                    "✅ Finished all pages for {} ({} pages, {} new records)",
                    keyword, stats.pages, stats.new_records
                );
                KeywordOutcome::Exhausted(stats)
            }
            Ok(Finish::PageCapReached) => {
                warn!(
                    "⏸️ Page cap of {} reached for {}, cursor kept for next run",
                    self.max_pages, keyword
                );
                KeywordOutcome::PageCapReached(stats)
            }
            Err(error) => {
                error!(
                    "❌ Harvest of {} stopped after {} pages: {}",
                    keyword, stats.pages, error
                );
                if let Err(marker_error) = self.state.marker.set(keyword).await {
                    error!("Failed to save resume marker for {}: {}", keyword, marker_error);
                }
                KeywordOutcome::Interrupted { stats, error }
            }
        }
    }

    async fn run_pages(&mut self, keyword: &str, stats: &mut KeywordStats) -> Result<Finish> {
        let mut seen = self.state.ids.load().await?;
        let mut page_token = self.state.cursors.get(keyword).await?;

        match &page_token {
            Some(_) => info!("↪️ Resuming {} from saved page token", keyword),
            None => info!("🔍 Starting {} from the first page", keyword),
        }

        while stats.pages < self.max_pages {
            let outcome = self
                .process_page(keyword, page_token.as_deref(), &mut seen, stats)
                .await?;
            stats.pages += 1;

            match outcome {
                PageOutcome::NextPage(token) => page_token = Some(token),
                PageOutcome::Exhausted => return Ok(Finish::Exhausted),
            }
        }

        Ok(Finish::PageCapReached)
    }

    async fn process_page(
        &mut self,
        keyword: &str,
        page_token: Option<&str>,
        seen: &mut HashSet<String>,
        stats: &mut KeywordStats,
    ) -> Result<PageOutcome> {
        let request = SearchRequest {
            query: keyword,
            page_token,
            filters: &self.search,
        };
        let page = self.api.search(&request).await?;
        stats.ids_seen += page.video_ids.len();

        let mut in_page = HashSet::new();
        let fresh: Vec<String> = page
            .video_ids
            .iter()
            .filter(|id| !seen.contains(*id) && in_page.insert(id.as_str()))
            .cloned()
            .collect();

        if fresh.is_empty() {
            debug!("Page {} of {}: no unseen ids", stats.pages + 1, keyword);
        } else {
            let items = self.api.details(&fresh).await?;
            let records: Vec<ResultRecord> = items
                .into_iter()
                .map(|item| ResultRecord::from_item(item, keyword))
                .collect();
            stats.new_records += self.sink.append(&records)?;
            debug!(
                "Page {} of {}: {} unseen ids, {} records",
                stats.pages + 1,
                keyword,
                fresh.len(),
                records.len()
            );
        }

        // Every id on the page is recorded, not only the freshly fetched ones
        self.state.ids.save(page.video_ids.iter().cloned()).await?;
        seen.extend(page.video_ids);

        match page.next_page_token {
            Some(token) => {
                self.state.cursors.set(keyword, &token).await?;
                Ok(PageOutcome::NextPage(token))
            }
            None => {
                self.state.cursors.clear(keyword).await?;
                Ok(PageOutcome::Exhausted)
            }
        }
    }
}
