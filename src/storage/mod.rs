//! Result sink: tabular normalization and export.
//!
//! A run's programs become one `ResultTable` with fixed columns. Sinks
//! write that table once at the end of the run.
//!
//! ```text
//! keyword | program_name | faculty | university | program_type | tuition_fee | url | scrape_time
//! ```

pub mod local;

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ProgramDetail;

pub use local::LocalExport;

const COLUMN_COUNT: usize = 8;

/// Column headers, in output order.
pub const COLUMNS: [&str; COLUMN_COUNT] = [
    "keyword",
    "program_name",
    "faculty",
    "university",
    "program_type",
    "tuition_fee",
    "url",
    "scrape_time",
];

/// Format of the `scrape_time` column.
pub const SCRAPE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One export row, aligned with `COLUMNS`.
pub type Row = [String; COLUMN_COUNT];

/// Collected programs flattened into rows of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    rows: Vec<Row>,
}

impl ResultTable {
    /// Build the table, writing `sentinel` for fields that were never found.
    ///
    /// With `dedupe`, only the first row for each (keyword, url) pair is kept.
    pub fn from_programs(programs: &[ProgramDetail], sentinel: &str, dedupe: bool) -> Self {
        let mut seen = HashSet::new();
        let rows = programs
            .iter()
            .filter(|p| !dedupe || seen.insert((p.keyword.as_str(), p.detail_url.as_str())))
            .map(|p| {
                [
                    p.keyword.clone(),
                    p.program_name.clone(),
                    p.faculty.clone(),
                    p.university.clone(),
                    p.program_type.render(sentinel).to_string(),
                    p.tuition_fee.render(sentinel).to_string(),
                    p.detail_url.clone(),
                    p.fetch_timestamp.format(SCRAPE_TIME_FORMAT).to_string(),
                ]
            })
            .collect();
        Self { rows }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Where a save ended up.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub row_count: usize,
    pub csv_path: Option<PathBuf>,
    pub xlsx_path: Option<PathBuf>,
}

impl ExportSummary {
    /// Every file written, spreadsheet first.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.xlsx_path.iter().chain(self.csv_path.iter())
    }
}

/// Trait for result export backends.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist the table. An empty table writes nothing and returns `None`.
    async fn save(&self, table: &ResultTable) -> Result<Option<ExportSummary>>;
}
