use serde::Deserialize;

/// Root application configuration. Loaded from an optional
/// `sms-insights.toml` next to the binary's working directory and from
/// environment variables with the prefix `SMS_INSIGHTS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where monthly exports are read from and where the consolidated
/// dataset is written.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    /// Glob pattern relative to `source_dir`. The matched file stem becomes
    /// the `month` tag.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
    /// Free-text column removed from every source table.
    #[serde(default = "default_dropped_column")]
    pub dropped_column: String,
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_quantile_bins")]
    pub quantile_bins: usize,
    /// Family-wise error rate for Tukey HSD and the significance verdicts.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default = "default_top_countries")]
    pub top_countries: usize,
    #[serde(default = "default_longest_country_values")]
    pub longest_country_values: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_source_dir() -> String {
    "SMS_data".to_string()
}
fn default_file_pattern() -> String {
    "2024-*.xlsx".to_string()
}
fn default_dropped_column() -> String {
    "SMS content".to_string()
}
fn default_output_path() -> String {
    "all_sms_data.parquet".to_string()
}
fn default_quantile_bins() -> usize {
    4
}
fn default_alpha() -> f64 {
    0.05
}
fn default_preview_rows() -> usize {
    20
}
fn default_top_countries() -> usize {
    10
}
fn default_longest_country_values() -> usize {
    15
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8501
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            file_pattern: default_file_pattern(),
            dropped_column: default_dropped_column(),
            output_path: default_output_path(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            quantile_bins: default_quantile_bins(),
            alpha: default_alpha(),
            preview_rows: default_preview_rows(),
            top_countries: default_top_countries(),
            longest_country_values: default_longest_country_values(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            analysis: AnalysisConfig::default(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional `sms-insights.toml` and
    /// environment variables. Environment wins over the file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("sms-insights").required(false))
            .add_source(
                config::Environment::with_prefix("SMS_INSIGHTS")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
