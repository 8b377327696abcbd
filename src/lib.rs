//! Video Harvester
//!
//! Resumable, quota-aware harvesting of video metadata from the YouTube Data API.
//! Keywords are processed one at a time; seen ids, pagination cursors and a
//! resume marker are persisted so a run interrupted by quota exhaustion picks
//! up where it stopped.

pub mod client;
pub mod config;
pub mod error;
pub mod harvest;
pub mod record;
pub mod scheduler;
pub mod sink;
pub mod state;

// Re-export main types for easy access
pub use crate::client::{SearchPage, SearchRequest, VideoApi, VideoItem, YouTubeClient};
pub use crate::config::{ApiKey, Config, ConfigBuilder, CorruptStatePolicy};
pub use crate::error::{HarvestError, Result};
pub use crate::harvest::{Harvester, KeywordOutcome, KeywordStats, PageOutcome};
pub use crate::record::ResultRecord;
pub use crate::scheduler::{BatchReport, KeywordScheduler};
pub use crate::sink::{CsvSink, RecordSink};
pub use crate::state::{
    CursorStore, FileStore, HarvestState, IdentifierStore, KeyValueStore, MemoryStore,
    ResumeMarker,
};
