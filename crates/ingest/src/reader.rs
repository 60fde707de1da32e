//! Reading raw tables out of export files.

use calamine::{open_workbook_auto, Data, Reader};
use sms_core::{InsightsError, InsightsResult};
use std::path::Path;

/// A source table exactly as read: headers plus one string per cell,
/// stored column-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<String>>,
}

impl RawTable {
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Assemble a table from its header row and data rows. `header_row` is
    /// the 1-based sheet row of the header, used in error messages.
    ///
    /// Trailing blank headers are dropped and short rows are padded with
    /// empty cells. A non-empty cell past the last header is an error.
    fn from_rows<I>(
        path: &Path,
        mut headers: Vec<String>,
        header_row: usize,
        rows: I,
    ) -> InsightsResult<Self>
    where
        I: IntoIterator<Item = InsightsResult<Vec<String>>>,
    {
        while headers.last().is_some_and(|h| h.trim().is_empty()) {
            headers.pop();
        }
        if headers.is_empty() {
            return Err(InsightsError::source_read(path.display(), "no header row"));
        }

        let width = headers.len();
        let mut columns: Vec<Vec<String>> = vec![Vec::new(); width];
        for (i, row) in rows.into_iter().enumerate() {
            let mut row = row?;
            if let Some(extra) = row.iter().skip(width).position(|c| !c.trim().is_empty()) {
                return Err(InsightsError::source_read(
                    path.display(),
                    format!(
                        "row {}: value in column {} has no header",
                        header_row + i + 1,
                        width + extra + 1
                    ),
                ));
            }
            row.resize(width, String::new());
            for (column, cell) in columns.iter_mut().zip(row) {
                column.push(cell);
            }
        }

        Ok(RawTable { headers, columns })
    }
}

/// Format-specific loader for one export file.
pub trait SourceReader {
    fn read(&self, path: &Path) -> InsightsResult<RawTable>;
}

/// Reads comma-separated exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSourceReader;

impl SourceReader for CsvSourceReader {
    fn read(&self, path: &Path) -> InsightsResult<RawTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| InsightsError::source_read(path.display(), e))?;

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| InsightsError::source_read(path.display(), e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let rows = rdr.records().enumerate().map(|(line, result)| {
            result
                .map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
                .map_err(|e| InsightsError::source_read(path.display(), format!("row {}: {e}", line + 2)))
        });
        RawTable::from_rows(path, headers, 1, rows)
    }
}

/// Reads the first worksheet of a spreadsheet workbook (`.xlsx`, `.xls`,
/// `.ods`).
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSourceReader;

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

impl SourceReader for XlsxSourceReader {
    fn read(&self, path: &Path) -> InsightsResult<RawTable> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| InsightsError::source_read(path.display(), e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| InsightsError::source_read(path.display(), "workbook has no worksheet"))?
            .map_err(|e| InsightsError::source_read(path.display(), e))?;

        let header_row = range.start().map_or(1, |(row, _)| row as usize + 1);
        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|r| r.iter().map(cell_text).collect())
            .unwrap_or_default();
        RawTable::from_rows(
            path,
            headers,
            header_row,
            rows.map(|r| Ok::<_, InsightsError>(r.iter().map(cell_text).collect())),
        )
    }
}

/// Picks the reader from the file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportReader {
    csv: CsvSourceReader,
    workbook: XlsxSourceReader,
}

impl SourceReader for ExportReader {
    fn read(&self, path: &Path) -> InsightsResult<RawTable> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => self.csv.read(path),
            Some("xlsx" | "xlsm" | "xls" | "ods") => self.workbook.read(path),
            _ => Err(InsightsError::source_read(
                path.display(),
                "unsupported file type (expected .csv or .xlsx)",
            )),
        }
    }
}
