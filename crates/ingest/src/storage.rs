//! Parquet persistence of the consolidated dataset.
//!
//! The dataset is converted to a single Arrow `RecordBatch` and written with
//! the `parquet` crate's `ArrowWriter`. Writes go to a temporary file in the
//! destination directory which is then renamed over the target, so readers
//! never observe a half-written file.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType as ArrowType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use sms_core::{Column, ColumnData, DataType, Dataset, InsightsError};
use tracing::debug;

/// Error type for Parquet operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Parquet read/write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported column type for '{column}': {dtype}")]
    UnsupportedType { column: String, dtype: ArrowType },

    #[error("Invalid dataset: {0}")]
    Dataset(String),
}

impl From<StorageError> for InsightsError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(io) => InsightsError::Io(io),
            other => InsightsError::Storage(other.to_string()),
        }
    }
}

fn arrow_type(dtype: DataType) -> ArrowType {
    match dtype {
        DataType::Utf8 => ArrowType::Utf8,
        DataType::Float64 => ArrowType::Float64,
        DataType::Int64 => ArrowType::Int64,
        DataType::Boolean => ArrowType::Boolean,
    }
}

/// Convert a dataset into one Arrow record batch.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch, StorageError> {
    let fields: Vec<Field> = dataset
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.dtype()), true))
        .collect();

    let arrays: Vec<ArrayRef> = dataset
        .columns()
        .iter()
        .map(|c| -> ArrayRef {
            match &c.data {
                ColumnData::Utf8(v) => Arc::new(StringArray::from(v.clone())),
                ColumnData::Float64(v) => Arc::new(Float64Array::from(v.clone())),
                ColumnData::Int64(v) => Arc::new(Int64Array::from(v.clone())),
                ColumnData::Boolean(v) => Arc::new(BooleanArray::from(v.clone())),
            }
        })
        .collect();

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Map an Arrow array onto the dataset's column types, widening narrower
/// numeric and string encodings written by other tools.
fn column_data(name: &str, array: &ArrayRef) -> Result<ColumnData, StorageError> {
    let target = match array.data_type() {
        ArrowType::Utf8 | ArrowType::LargeUtf8 | ArrowType::Utf8View => ArrowType::Utf8,
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => ArrowType::Float64,
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32 => ArrowType::Int64,
        ArrowType::Boolean => ArrowType::Boolean,
        other => {
            return Err(StorageError::UnsupportedType {
                column: name.to_string(),
                dtype: other.clone(),
            })
        }
    };
    let array = arrow::compute::cast(array, &target)?;
    let any = array.as_any();

    let data = match target {
        ArrowType::Utf8 => {
            let a = downcast::<StringArray>(name, any)?;
            ColumnData::Utf8(a.iter().map(|v| v.map(str::to_string)).collect())
        }
        ArrowType::Float64 => {
            ColumnData::Float64(downcast::<Float64Array>(name, any)?.iter().collect())
        }
        ArrowType::Int64 => ColumnData::Int64(downcast::<Int64Array>(name, any)?.iter().collect()),
        _ => ColumnData::Boolean(downcast::<BooleanArray>(name, any)?.iter().collect()),
    };
    Ok(data)
}

fn downcast<'a, T: 'static>(name: &str, any: &'a dyn std::any::Any) -> Result<&'a T, StorageError> {
    any.downcast_ref::<T>()
        .ok_or_else(|| StorageError::Dataset(format!("unexpected array layout for '{name}'")))
}

/// Convert record batches sharing one schema back into a dataset.
pub fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Dataset, StorageError> {
    let mut columns = Vec::with_capacity(schema.fields().len());
    for (idx, field) in schema.fields().iter().enumerate() {
        let mut data: Option<ColumnData> = None;
        for batch in batches {
            let part = column_data(field.name(), batch.column(idx))?;
            match data.as_mut() {
                Some(existing) => existing
                    .extend(part)
                    .map_err(|e| StorageError::Dataset(e.to_string()))?,
                None => data = Some(part),
            }
        }
        let data = match data {
            Some(data) => data,
            None => {
                let empty = arrow::array::new_empty_array(field.data_type());
                column_data(field.name(), &empty)?
            }
        };
        columns.push(Column::new(field.name().clone(), data));
    }
    Dataset::new(columns).map_err(|e| StorageError::Dataset(e.to_string()))
}

/// Write the dataset to `path`, replacing any existing file.
pub fn write_parquet(path: &Path, dataset: &Dataset) -> Result<(), StorageError> {
    let batch = to_record_batch(dataset)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
    }
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;

    debug!(path = %path.display(), rows = batch.num_rows(), "Parquet file written");
    Ok(())
}

/// Read a dataset previously written by [`write_parquet`].
pub fn read_parquet(path: &Path) -> Result<Dataset, StorageError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches: Result<Vec<_>, _> = reader.collect();
    from_record_batches(&schema, &batches?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new("Delivery_rate", ColumnData::Float64(vec![Some(97.5), None])),
            Column::new("SMS_content_length", ColumnData::Int64(vec![Some(120), Some(64)])),
            Column::new("Contains_link", ColumnData::Boolean(vec![None, Some(false)])),
            Column::new(
                "Country_of_recipients",
                ColumnData::Utf8(vec![Some("US".into()), None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_parquet_preserves_types_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_sms_data.parquet");
        let ds = sample();

        write_parquet(&path, &ds).unwrap();
        let back = read_parquet(&path).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        std::fs::write(&path, b"stale").unwrap();

        write_parquet(&path, &sample()).unwrap();
        assert_eq!(read_parquet(&path).unwrap().num_rows(), 2);
        // Only the target remains; the temporary file was renamed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_narrow_arrow_types_are_widened() {
        let schema = Schema::new(vec![Field::new("n", ArrowType::Int32, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema.clone()),
            vec![Arc::new(arrow::array::Int32Array::from(vec![Some(7), None])) as ArrayRef],
        )
        .unwrap();
        let ds = from_record_batches(&schema, &[batch]).unwrap();
        assert_eq!(ds.column("n").unwrap().data, ColumnData::Int64(vec![Some(7), None]));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err: InsightsError = read_parquet(Path::new("/nope/missing.parquet"))
            .unwrap_err()
            .into();
        assert!(matches!(err, InsightsError::Io(_)));
    }
}
