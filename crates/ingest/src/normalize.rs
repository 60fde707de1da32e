//! Column normalization and schema validation for one source table.
//!
//! Headers are trimmed and spaces become underscores. The free-text column
//! is dropped, required columns are renamed to their canonical spelling and
//! parsed into their declared type, and any other column is passed through
//! with an inferred type. Flag columns exported as two-valued text
//! (`Link`/`No link`) stay text; the analysis checks they are dichotomous.

use crate::reader::RawTable;
use crate::source::SourceFile;
use sms_core::dataset::parse_number;
use sms_core::schema::{self, REQUIRED_COLUMNS};
use sms_core::{Column, ColumnData, DataType, InsightsError, InsightsResult};

/// A source table after normalization, ready to be concatenated.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub period: String,
    pub columns: Vec<Column>,
    pub rows: usize,
    /// Non-empty cells of required columns that did not parse as their type.
    pub coercion_failures: usize,
}

pub fn normalize(
    raw: RawTable,
    source: &SourceFile,
    dropped_column: &str,
) -> InsightsResult<NormalizedTable> {
    let rows = raw.num_rows();
    let dropped = schema::normalize_column_name(dropped_column);
    let mut dropped_seen = false;
    let mut coercion_failures = 0;
    let mut columns: Vec<Column> = Vec::with_capacity(raw.headers.len());

    for (header, cells) in raw.headers.iter().zip(raw.columns) {
        let name = schema::normalize_column_name(header);
        if name.eq_ignore_ascii_case(&dropped) {
            dropped_seen = true;
            continue;
        }
        // Re-stamped from the file name after concatenation.
        if name == schema::MONTH {
            continue;
        }

        let column = match schema::required_column(&name) {
            Some(required) => {
                let dtype = match required.dtype {
                    DataType::Boolean if !all_flags(&cells) => DataType::Utf8,
                    other => other,
                };
                let (data, failures) = parse_typed(&cells, dtype);
                coercion_failures += failures;
                Column::new(required.name, data)
            }
            None => Column::new(name, infer(&cells)),
        };

        if columns.iter().any(|c| c.name == column.name) {
            return Err(InsightsError::source_read(
                source.path.display(),
                format!("duplicate column '{}' after normalization", column.name),
            ));
        }
        columns.push(column);
    }

    if !dropped_seen {
        return Err(InsightsError::source_read(
            source.path.display(),
            format!("missing column '{dropped_column}'"),
        ));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .map(|c| c.name)
        .filter(|name| !columns.iter().any(|c| c.name == *name))
        .collect();
    if !missing.is_empty() {
        return Err(InsightsError::source_read(
            source.path.display(),
            format!("missing required column(s): {}", missing.join(", ")),
        ));
    }

    Ok(NormalizedTable {
        period: source.period.clone(),
        columns,
        rows,
        coercion_failures,
    })
}

fn non_empty(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub(crate) fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Every non-empty cell reads as a boolean flag.
fn all_flags(cells: &[String]) -> bool {
    cells
        .iter()
        .filter_map(|c| non_empty(c))
        .all(|c| parse_bool(c).is_some())
}

pub(crate) fn parse_int(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let v = trimmed.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64).then_some(v as i64)
}

/// Parse cells into `dtype`, counting non-empty cells that fail.
fn parse_typed(cells: &[String], dtype: DataType) -> (ColumnData, usize) {
    let mut failures = 0;
    let mut track = |cell: &str, parsed: bool| {
        if !parsed && non_empty(cell).is_some() {
            failures += 1;
        }
    };

    let data = match dtype {
        DataType::Float64 => ColumnData::Float64(
            cells
                .iter()
                .map(|c| {
                    let v = parse_number(c);
                    track(c, v.is_some());
                    v
                })
                .collect(),
        ),
        DataType::Int64 => ColumnData::Int64(
            cells
                .iter()
                .map(|c| {
                    let v = parse_int(c);
                    track(c, v.is_some());
                    v
                })
                .collect(),
        ),
        DataType::Boolean => ColumnData::Boolean(
            cells
                .iter()
                .map(|c| {
                    let v = parse_bool(c);
                    track(c, v.is_some());
                    v
                })
                .collect(),
        ),
        DataType::Utf8 => ColumnData::Utf8(
            cells
                .iter()
                .map(|c| non_empty(c).map(str::to_string))
                .collect(),
        ),
    };
    (data, failures)
}

/// Narrowest type every non-empty cell parses as.
fn infer(cells: &[String]) -> ColumnData {
    let present: Vec<&str> = cells.iter().filter_map(|c| non_empty(c)).collect();

    let dtype = if present.is_empty() {
        DataType::Utf8
    } else if present
        .iter()
        .all(|c| c.eq_ignore_ascii_case("true") || c.eq_ignore_ascii_case("false"))
    {
        DataType::Boolean
    } else if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        DataType::Float64
    } else {
        DataType::Utf8
    };

    match dtype {
        DataType::Utf8 => ColumnData::Utf8(
            cells
                .iter()
                .map(|c| non_empty(c).map(|_| c.clone()))
                .collect(),
        ),
        other => parse_typed(cells, other).0,
    }
}
