use crate::error::Result;
use crate::record::{ResultRecord, COLUMNS};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::info;

/// Append-only destination for harvested records
pub trait RecordSink: Send {
    /// Append one batch; returns the number of records written
    fn append(&mut self, records: &[ResultRecord]) -> Result<usize>;
}

/// Collects records in memory
impl RecordSink for Vec<ResultRecord> {
    fn append(&mut self, records: &[ResultRecord]) -> Result<usize> {
        self.extend_from_slice(records);
        Ok(records.len())
    }
}

/// Appends records to a CSV file, writing the header only for a new file
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn needs_header(&self) -> bool {
        std::fs::metadata(&self.path).map_or(true, |meta| meta.len() == 0)
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, records: &[ResultRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let write_header = self.needs_header();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if write_header {
            writer.write_record(COLUMNS)?;
        }
        for record in records {
            writer.write_record(record.to_row())?;
        }
        writer.flush()?;

        info!("💾 Appended {} records to {}", records.len(), self.path.display());
        Ok(records.len())
    }
}
