//! Record sink: the seam to whatever engine turns an OutputGrid into a file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::grid::{CellAddr, CellValue, OutputGrid};

/// Error opening a template or saving a record.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("template {0} not found")]
    TemplateMissing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
}

/// Opens a template, accepts cell writes, saves the result.
///
/// Text values that read as numbers are stored as numbers; implementations
/// apply [`CellValue::normalized`] in `set_cell`.
pub trait RecordSink {
    type Record;

    /// File extension of saved records, without the dot.
    fn extension(&self) -> &str;

    fn open(&self, template: &str) -> Result<Self::Record, SinkError>;

    fn set_cell(&self, record: &mut Self::Record, addr: CellAddr, value: CellValue);

    fn save(&self, record: Self::Record, path: &Path) -> Result<(), SinkError>;
}

/// Record held in memory by [`MemorySink`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRecord {
    pub template: String,
    pub grid: OutputGrid,
}

/// Sink that keeps saved records in memory; nothing touches the disk.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(PathBuf, MemoryRecord)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records saved so far, in save order.
    pub fn saved(&self) -> Vec<(PathBuf, MemoryRecord)> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

impl RecordSink for MemorySink {
    type Record = MemoryRecord;

    fn extension(&self) -> &str {
        "xls"
    }

    fn open(&self, template: &str) -> Result<MemoryRecord, SinkError> {
        Ok(MemoryRecord {
            template: template.to_owned(),
            grid: OutputGrid::new(),
        })
    }

    fn set_cell(&self, record: &mut MemoryRecord, addr: CellAddr, value: CellValue) {
        record
            .grid
            .set(addr.sheet, addr.row, addr.col, value.normalized());
    }

    fn save(&self, record: MemoryRecord, path: &Path) -> Result<(), SinkError> {
        if let Ok(mut saved) = self.saved.lock() {
            saved.push((path.to_path_buf(), record));
        }
        Ok(())
    }
}
