//! Concatenation of normalized tables into one dataset.

use crate::normalize::NormalizedTable;
use sms_core::schema::MONTH;
use sms_core::{Column, ColumnData, DataType, Dataset, InsightsResult};

/// Stack tables in the given order. Columns are the union of all tables in
/// order of first appearance; a table lacking a column contributes nulls.
/// The `month` tag column is appended last.
pub fn concat(tables: Vec<NormalizedTable>) -> InsightsResult<Dataset> {
    let mut layout: Vec<(String, DataType)> = Vec::new();
    for table in &tables {
        for column in &table.columns {
            match layout.iter_mut().find(|(name, _)| *name == column.name) {
                Some((_, dtype)) => *dtype = dtype.widen(column.dtype()),
                None => layout.push((column.name.clone(), column.dtype())),
            }
        }
    }

    let mut merged: Vec<Column> = layout
        .iter()
        .map(|(name, dtype)| Column::new(name.clone(), ColumnData::nulls(*dtype, 0)))
        .collect();
    let mut months: Vec<Option<String>> = Vec::new();

    for table in tables {
        let NormalizedTable {
            period,
            columns,
            rows,
            ..
        } = table;
        let mut columns: Vec<Option<Column>> = columns.into_iter().map(Some).collect();

        for (target, (name, dtype)) in merged.iter_mut().zip(&layout) {
            let part = columns
                .iter_mut()
                .find(|c| c.as_ref().is_some_and(|c| c.name == *name))
                .and_then(Option::take)
                .map(|c| c.data.cast(*dtype))
                .transpose()?
                .unwrap_or_else(|| ColumnData::nulls(*dtype, rows));
            target.data.extend(part)?;
        }
        months.extend(std::iter::repeat(Some(period)).take(rows));
    }

    merged.push(Column::new(MONTH, ColumnData::Utf8(months)));
    Dataset::new(merged)
}
