//! In-memory columnar dataset shared by ingestion, analysis, and the views.
//!
//! A [`Dataset`] is built once (by ingestion or by loading the consolidated
//! Parquet file) and never mutated afterwards. Analyses borrow it and
//! return derived values of their own.

use crate::error::{InsightsError, InsightsResult};
use serde::Serialize;
use std::fmt;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Utf8,
    Float64,
    Int64,
    #[serde(rename = "bool")]
    Boolean,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Utf8 => "utf8",
            DataType::Float64 => "float64",
            DataType::Int64 => "int64",
            DataType::Boolean => "bool",
        }
    }

    /// Common type two columns are widened to when concatenated.
    pub fn widen(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            _ => Utf8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell of unknown type, borrowed from a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'a str),
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric coercion. Text is parsed after trimming (a trailing `%` is
    /// tolerated); anything unparseable is `None` rather than zero.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Null => None,
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Int(v) => Some(v as f64),
            Value::Float(v) if v.is_nan() => None,
            Value::Float(v) => Some(v),
            Value::Text(s) => parse_number(s),
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Parse a numeric cell the way spreadsheet exports write them.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').map(str::trim_end).unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Typed storage for one column; `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Utf8(Vec<Option<String>>),
    Float64(Vec<Option<f64>>),
    Int64(Vec<Option<i64>>),
    Boolean(Vec<Option<bool>>),
}

impl ColumnData {
    pub fn nulls(dtype: DataType, len: usize) -> Self {
        match dtype {
            DataType::Utf8 => ColumnData::Utf8(vec![None; len]),
            DataType::Float64 => ColumnData::Float64(vec![None; len]),
            DataType::Int64 => ColumnData::Int64(vec![None; len]),
            DataType::Boolean => ColumnData::Boolean(vec![None; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn value(&self, row: usize) -> Value<'_> {
        match self {
            ColumnData::Utf8(v) => v[row].as_deref().map_or(Value::Null, Value::Text),
            ColumnData::Float64(v) => v[row].map_or(Value::Null, Value::Float),
            ColumnData::Int64(v) => v[row].map_or(Value::Null, Value::Int),
            ColumnData::Boolean(v) => v[row].map_or(Value::Null, Value::Bool),
        }
    }

    /// Convert to `dtype`. Only lossless widenings are supported: any type
    /// to `utf8`, and `int64` to `float64`.
    pub fn cast(self, dtype: DataType) -> InsightsResult<Self> {
        if self.dtype() == dtype {
            return Ok(self);
        }
        match (self, dtype) {
            (ColumnData::Int64(v), DataType::Float64) => Ok(ColumnData::Float64(
                v.into_iter().map(|x| x.map(|i| i as f64)).collect(),
            )),
            (data, DataType::Utf8) => {
                let len = data.len();
                let text = (0..len)
                    .map(|i| {
                        let value = data.value(i);
                        (!value.is_null()).then(|| value.to_string())
                    })
                    .collect();
                Ok(ColumnData::Utf8(text))
            }
            (data, target) => Err(InsightsError::Storage(format!(
                "cannot cast {} column to {}",
                data.dtype(),
                target
            ))),
        }
    }

    /// Append `other`, which must already have the same type.
    pub fn extend(&mut self, other: ColumnData) -> InsightsResult<()> {
        match (self, other) {
            (ColumnData::Utf8(a), ColumnData::Utf8(b)) => a.extend(b),
            (ColumnData::Float64(a), ColumnData::Float64(b)) => a.extend(b),
            (ColumnData::Int64(a), ColumnData::Int64(b)) => a.extend(b),
            (ColumnData::Boolean(a), ColumnData::Boolean(b)) => a.extend(b),
            (a, b) => {
                return Err(InsightsError::Storage(format!(
                    "cannot append {} values to a {} column",
                    b.dtype(),
                    a.dtype()
                )))
            }
        }
        Ok(())
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn value(&self, row: usize) -> Value<'_> {
        self.data.value(row)
    }

    pub fn values(&self) -> impl Iterator<Item = Value<'_>> + '_ {
        (0..self.len()).map(move |i| self.data.value(i))
    }
}

/// Ordered collection of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> InsightsResult<Self> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
                return Err(InsightsError::Storage(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    rows
                )));
            }
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(InsightsError::Storage(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> InsightsResult<&Column> {
        self.get(name).ok_or_else(|| InsightsError::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    pub fn dtypes(&self) -> Vec<(&str, DataType)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.dtype()))
            .collect()
    }

    /// First `n` rows, each as one value per column.
    pub fn head(&self, n: usize) -> Vec<Vec<Value<'_>>> {
        (0..n.min(self.num_rows()))
            .map(|row| self.columns.iter().map(|c| c.value(row)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new(
                "Delivery_rate",
                ColumnData::Float64(vec![Some(80.0), None, Some(60.0)]),
            ),
            Column::new(
                "Country_of_recipients",
                ColumnData::Utf8(vec![Some("US".into()), Some("Germany".into()), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_and_dtypes() {
        let ds = sample();
        assert_eq!(ds.shape(), (3, 2));
        assert_eq!(
            ds.dtypes(),
            vec![
                ("Delivery_rate", DataType::Float64),
                ("Country_of_recipients", DataType::Utf8)
            ]
        );
        assert_eq!(ds.head(2).len(), 2);
        assert_eq!(ds.head(10).len(), 3);
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::new("a", ColumnData::Int64(vec![Some(1)])),
            Column::new("b", ColumnData::Int64(vec![Some(1), Some(2)])),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_missing_column_is_skip() {
        let err = sample().column("Reply_rate").unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Text(" 42.5 ").as_f64(), Some(42.5));
        assert_eq!(Value::Text("97%").as_f64(), Some(97.0));
        assert_eq!(Value::Text("n/a").as_f64(), None);
        assert_eq!(Value::Text("").as_f64(), None);
        assert_eq!(Value::Float(f64::NAN).as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_cast_and_extend() {
        let mut ints = ColumnData::Int64(vec![Some(1), None]).cast(DataType::Float64).unwrap();
        ints.extend(ColumnData::Float64(vec![Some(2.5)])).unwrap();
        assert_eq!(ints, ColumnData::Float64(vec![Some(1.0), None, Some(2.5)]));

        let text = ColumnData::Boolean(vec![Some(true), None]).cast(DataType::Utf8).unwrap();
        assert_eq!(text, ColumnData::Utf8(vec![Some("True".into()), None]));

        assert!(ColumnData::Utf8(vec![]).cast(DataType::Int64).is_err());
        assert_eq!(DataType::Int64.widen(DataType::Float64), DataType::Float64);
        assert_eq!(DataType::Boolean.widen(DataType::Int64), DataType::Utf8);
    }
}
