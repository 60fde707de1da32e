//! Ingestion of monthly SMS campaign exports into one consolidated
//! Parquet dataset.

pub mod concat;
pub mod normalize;
pub mod pipeline;
pub mod reader;
pub mod source;
pub mod storage;

pub use pipeline::{load_dataset, IngestReport, Ingestor, SourceSummary};
pub use reader::{CsvSourceReader, ExportReader, RawTable, SourceReader, XlsxSourceReader};
pub use source::{discover, SourceFile};
