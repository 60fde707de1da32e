//! Dashboard views over the consolidated dataset: the data preview, the
//! analysis view, and their plain-text rendering.

pub mod analysis;
pub mod preview;
pub mod render;

pub use analysis::{build_analysis, AnalysisView, Comparison, ComparisonSummary, Section};
pub use preview::{build_preview, ColumnType, DataPreview};
