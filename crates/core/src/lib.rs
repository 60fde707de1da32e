pub mod config;
pub mod dataset;
pub mod error;
pub mod schema;

pub use config::AppConfig;
pub use dataset::{Column, ColumnData, DataType, Dataset, Value};
pub use error::{InsightsError, InsightsResult};
