//! Data preview: head rows, column types and shape.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sms_core::{DataType, Dataset, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnType {
    pub name: String,
    pub dtype: DataType,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub dtypes: Vec<ColumnType>,
    pub num_rows: usize,
    pub num_columns: usize,
    /// `"{rows} rows × {cols} columns"`.
    pub shape: String,
    pub generated_at: DateTime<Utc>,
}

fn cell(value: Value<'_>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Int(i) => serde_json::Value::from(i),
        // Non-finite floats have no JSON form.
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.to_string()),
    }
}

pub fn build_preview(dataset: &Dataset, rows: usize) -> DataPreview {
    let (num_rows, num_columns) = dataset.shape();
    DataPreview {
        columns: dataset.column_names().into_iter().map(String::from).collect(),
        rows: dataset
            .head(rows)
            .into_iter()
            .map(|row| row.into_iter().map(cell).collect())
            .collect(),
        dtypes: dataset
            .dtypes()
            .into_iter()
            .map(|(name, dtype)| ColumnType {
                name: name.to_string(),
                dtype,
            })
            .collect(),
        num_rows,
        num_columns,
        shape: format!("{num_rows} rows × {num_columns} columns"),
        generated_at: Utc::now(),
    }
}
