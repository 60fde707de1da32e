//! The ingestion run: discover → read → normalize → concatenate → persist.

use crate::concat::concat;
use crate::normalize::normalize;
use crate::reader::{ExportReader, SourceReader};
use crate::source::{discover, SourceFile};
use crate::storage;
use serde::Serialize;
use sms_core::config::IngestConfig;
use sms_core::{Dataset, InsightsResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-file outcome of an ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub period: String,
    pub rows: usize,
    pub coercion_failures: usize,
}

/// Outcome of a complete ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub sources: Vec<SourceSummary>,
    pub total_rows: usize,
    pub columns: Vec<String>,
    pub coercion_failures: usize,
    pub output_path: PathBuf,
}

/// Consolidates monthly exports into one Parquet file.
pub struct Ingestor<R = ExportReader> {
    config: IngestConfig,
    reader: R,
}

impl Ingestor<ExportReader> {
    /// Ingestor reading CSV or workbook exports by file extension.
    pub fn new(config: IngestConfig) -> Self {
        Self::with_reader(config, ExportReader::default())
    }
}

impl<R: SourceReader> Ingestor<R> {
    pub fn with_reader(config: IngestConfig, reader: R) -> Self {
        Self { config, reader }
    }

    /// Load every matching source and concatenate them in file order.
    /// The first file that cannot be read or validated aborts the run.
    pub fn build_dataset(&self) -> InsightsResult<(Dataset, Vec<SourceSummary>)> {
        let files = discover(&self.config.source_dir, &self.config.file_pattern)?;
        let mut tables = Vec::with_capacity(files.len());
        let mut summaries = Vec::with_capacity(files.len());

        for file in &files {
            let table = self.load_source(file)?;
            summaries.push(SourceSummary {
                path: file.path.clone(),
                period: table.period.clone(),
                rows: table.rows,
                coercion_failures: table.coercion_failures,
            });
            tables.push(table);
        }

        let dataset = concat(tables)?;
        Ok((dataset, summaries))
    }

    fn load_source(&self, file: &SourceFile) -> InsightsResult<crate::normalize::NormalizedTable> {
        let raw = self.reader.read(&file.path)?;
        let table = normalize(raw, file, &self.config.dropped_column)?;

        metrics::counter!("ingest.files").increment(1);
        metrics::counter!("ingest.rows").increment(table.rows as u64);
        if table.coercion_failures > 0 {
            metrics::counter!("ingest.coercion_failures").increment(table.coercion_failures as u64);
            warn!(
                file = %file.path.display(),
                failures = table.coercion_failures,
                "Cells failed type validation and were stored as missing"
            );
        }
        info!(file = %file.path.display(), period = %table.period, rows = table.rows, "Source loaded");
        Ok(table)
    }

    /// Run the full ingestion and overwrite the consolidated dataset file.
    pub fn run(&self) -> InsightsResult<IngestReport> {
        let (dataset, sources) = self.build_dataset()?;
        let output_path = PathBuf::from(&self.config.output_path);
        storage::write_parquet(&output_path, &dataset)?;

        let report = IngestReport {
            total_rows: dataset.num_rows(),
            columns: dataset.column_names().iter().map(|c| c.to_string()).collect(),
            coercion_failures: sources.iter().map(|s| s.coercion_failures).sum(),
            sources,
            output_path,
        };
        info!(
            files = report.sources.len(),
            rows = report.total_rows,
            columns = report.columns.len(),
            output = %report.output_path.display(),
            "Consolidated dataset written"
        );
        Ok(report)
    }
}

/// Load the consolidated dataset for analysis.
pub fn load_dataset(path: impl AsRef<Path>) -> InsightsResult<Dataset> {
    let path = path.as_ref();
    let dataset = storage::read_parquet(path)?;
    tracing::debug!(path = %path.display(), rows = dataset.num_rows(), "Dataset loaded");
    Ok(dataset)
}
