use crate::error::Result;
use crate::harvest::{Harvester, KeywordOutcome};
use crate::sink::RecordSink;
use tracing::{info, warn};

/// Summary of one batch run over the keyword list
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Index into the keyword list the run started from
    pub start_index: usize,
    pub outcomes: Vec<(String, KeywordOutcome)>,
    /// Keyword whose failure aborted the batch
    pub interrupted_at: Option<String>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.interrupted_at.is_none()
    }

    pub fn total_records(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| outcome.stats().new_records)
            .sum()
    }

    /// The error that interrupted the batch, if any
    pub fn interruption(&self) -> Option<(&str, &crate::error::HarvestError)> {
        self.outcomes.iter().find_map(|(keyword, outcome)| match outcome {
            KeywordOutcome::Interrupted { error, .. } => Some((keyword.as_str(), error)),
            _ => None,
        })
    }
}

/// Walks the fixed keyword list once per run, honouring the resume marker
pub struct KeywordScheduler<S: RecordSink> {
    harvester: Harvester<S>,
    keywords: Vec<String>,
}

impl<S: RecordSink> KeywordScheduler<S> {
    pub fn new(harvester: Harvester<S>, keywords: Vec<String>) -> Self {
        Self {
            harvester,
            keywords,
        }
    }

    /// Position to start from: the marked keyword if it is in the list, else the first
    pub async fn start_index(&self) -> Result<usize> {
        let marker = self.harvester.state().marker.get().await?;

        Ok(match marker {
            Some(keyword) => match self.keywords.iter().position(|k| *k == keyword) {
                Some(index) => {
                    info!(
                        "🔄 Resuming batch at keyword {} ({}/{})",
                        keyword,
                        index + 1,
                        self.keywords.len()
                    );
                    index
                }
                None => {
                    warn!(
                        "Resume marker names unknown keyword '{}', starting from the top",
                        keyword
                    );
                    0
                }
            },
            None => 0,
        })
    }

    /// Run every keyword from the resume point; stops at the first interrupted keyword.
    ///
    /// Errors are returned only for state that cannot be read or written before
    /// a keyword starts; API failures end up in the report instead.
    pub async fn run(&mut self) -> Result<BatchReport> {
        let start_index = self.start_index().await?;
        let mut report = BatchReport {
            start_index,
            ..BatchReport::default()
        };

        for keyword in self.keywords.iter().skip(start_index) {
            info!("🚀 Starting data fetch for keyword: {}", keyword);

            // Mark before fetching so a crash mid-keyword resumes here
            self.harvester.state().marker.set(keyword).await?;

            let outcome = self.harvester.harvest_keyword(keyword).await;
            let interrupted = outcome.is_interrupted();
            report.outcomes.push((keyword.clone(), outcome));

            if interrupted {
                report.interrupted_at = Some(keyword.clone());
                return Ok(report);
            }
            info!("Completed keyword: {}", keyword);
        }

        self.harvester.state().marker.clear().await?;
        info!(
            "🎉 All {} keywords processed, {} new records",
            self.keywords.len(),
            report.total_records()
        );
        Ok(report)
    }
}
