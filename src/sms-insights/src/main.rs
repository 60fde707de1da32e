//! SMS Insights — consolidate monthly SMS campaign exports and explore what
//! drives delivery and reply rates.

use clap::{Parser, Subcommand};
use sms_api::ApiServer;
use sms_core::config::AppConfig;
use sms_ingest::{load_dataset, Ingestor};
use sms_reporting::build_analysis;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sms-insights")]
#[command(about = "SMS campaign export consolidation and analysis")]
#[command(version)]
struct Cli {
    /// Human-readable logs instead of JSON
    #[arg(long, global = true, default_value_t = false)]
    plain_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidate the monthly exports into one Parquet dataset
    Ingest {
        /// Directory holding the monthly exports (overrides config)
        #[arg(long, env = "SMS_INSIGHTS__INGEST__SOURCE_DIR")]
        source_dir: Option<String>,

        /// File name glob inside the source directory (overrides config)
        #[arg(long, env = "SMS_INSIGHTS__INGEST__FILE_PATTERN")]
        pattern: Option<String>,

        /// Consolidated dataset path (overrides config)
        #[arg(long, env = "SMS_INSIGHTS__INGEST__OUTPUT_PATH")]
        output: Option<String>,
    },
    /// Serve the preview and analysis views over HTTP
    Dashboard {
        /// Bind address (overrides config)
        #[arg(long, env = "SMS_INSIGHTS__API__HOST")]
        host: Option<String>,

        /// HTTP port (overrides config)
        #[arg(long, env = "SMS_INSIGHTS__API__HTTP_PORT")]
        http_port: Option<u16>,
    },
    /// Print the analysis of the consolidated dataset
    Report {
        /// Consolidated dataset path (overrides config)
        #[arg(long)]
        dataset: Option<String>,

        /// Emit JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_tracing(plain: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "sms_insights=info,sms_ingest=info,sms_api=info,tower_http=info".into()
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if plain {
        builder.init();
    } else {
        builder.json().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    match cli.command {
        Command::Ingest {
            source_dir,
            pattern,
            output,
        } => {
            if let Some(dir) = source_dir {
                config.ingest.source_dir = dir;
            }
            if let Some(pattern) = pattern {
                config.ingest.file_pattern = pattern;
            }
            if let Some(output) = output {
                config.ingest.output_path = output;
            }
            info!(
                source_dir = %config.ingest.source_dir,
                pattern = %config.ingest.file_pattern,
                output = %config.ingest.output_path,
                "Starting ingestion"
            );

            let ingestor = Ingestor::new(config.ingest.clone());
            let report = tokio::task::spawn_blocking(move || ingestor.run()).await??;
            println!(
                "Wrote {} rows from {} files to {}",
                report.total_rows,
                report.sources.len(),
                report.output_path.display()
            );
            for source in &report.sources {
                println!("  {} ({} rows)", source.period, source.rows);
            }
        }
        Command::Dashboard { host, http_port } => {
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = http_port {
                config.api.http_port = port;
            }

            let server = ApiServer::new(config);
            if let Err(e) = server.start_metrics() {
                error!(error = %e, "Failed to start metrics exporter");
            }
            server.start_http().await?;
        }
        Command::Report { dataset, json } => {
            let path = dataset.unwrap_or_else(|| config.ingest.output_path.clone());
            let analysis = config.analysis.clone();
            let view = tokio::task::spawn_blocking(move || {
                let ds = load_dataset(&path)?;
                build_analysis(&ds, &analysis)
            })
            .await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{view}");
            }
        }
    }

    Ok(())
}
