//! Local filesystem export.
//!
//! Writes one spreadsheet and one CSV per run, both named after the run
//! timestamp:
//!
//! ```text
//! {dir}/
//! ├── {prefix}_{YYYYmmdd_HHMMSS}.xlsx
//! └── {prefix}_{YYYYmmdd_HHMMSS}.csv    # UTF-8 with BOM
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::OutputConfig;
use crate::storage::{ExportSummary, ResultSink, ResultTable, Row};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SHEET_NAME: &str = "programs";

/// Local filesystem export backend.
#[derive(Debug, Clone)]
pub struct LocalExport {
    dir: PathBuf,
    file_prefix: String,
    csv: bool,
    xlsx: bool,
}

impl LocalExport {
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            dir: output.dir.clone(),
            file_prefix: output.file_prefix.clone(),
            csv: output.csv,
            xlsx: output.xlsx,
        }
    }

    /// Save with an explicit run timestamp.
    pub async fn save_at(
        &self,
        table: &ResultTable,
        timestamp: DateTime<Local>,
    ) -> Result<Option<ExportSummary>> {
        if table.is_empty() {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = format!("{}_{}", self.file_prefix, timestamp.format("%Y%m%d_%H%M%S"));

        let xlsx_path = if self.xlsx {
            let path = self.dir.join(format!("{stem}.xlsx"));
            write_atomic(&path, &render_xlsx(table)?).await?;
            log::info!("Saved spreadsheet: {}", path.display());
            Some(path)
        } else {
            None
        };

        let csv_path = if self.csv {
            let path = self.dir.join(format!("{stem}.csv"));
            write_atomic(&path, &render_csv(table)).await?;
            log::info!("Saved CSV: {}", path.display());
            Some(path)
        } else {
            None
        };

        Ok(Some(ExportSummary {
            row_count: table.len(),
            csv_path,
            xlsx_path,
        }))
    }
}

#[async_trait]
impl ResultSink for LocalExport {
    async fn save(&self, table: &ResultTable) -> Result<Option<ExportSummary>> {
        self.save_at(table, Local::now()).await
    }
}

/// Write bytes atomically (write to temp, then rename).
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn render_xlsx(table: &ResultTable) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in table.headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            sheet.write_string(row_num, col as u16, cell)?;
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn render_csv(table: &ResultTable) -> Vec<u8> {
    let mut out = String::new();
    push_row(&mut out, table.headers().iter().copied());
    for row in table.rows() {
        push_row(&mut out, row_cells(row));
    }

    let mut bytes = Vec::with_capacity(UTF8_BOM.len() + out.len());
    bytes.extend_from_slice(UTF8_BOM);
    bytes.extend_from_slice(out.as_bytes());
    bytes
}

fn row_cells(row: &Row) -> impl Iterator<Item = &str> {
    row.iter().map(String::as_str)
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}
