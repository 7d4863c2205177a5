use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use archiva_api_client::DataManagementApiClient;
use archiva_core::Config;
use archiva_infra::{init_telemetry, TelemetryFormat};
use archiva_worker::{BatchCollectionDownloadPipeline, BatchDownloadRequest, BatchSinks, TokioFileSystem};

#[derive(Parser, Debug)]
#[command(name = "batch_download")]
#[command(about = "Download a whole collection tree into a local directory")]
struct Args {
    /// Logical path of the collection, e.g. /Tenant/project
    source_collection: String,

    /// Local directory the collection is written under
    destination: PathBuf,

    /// Number of parallel workers (default: BATCH_DOWNLOAD_THREADS or 1)
    #[arg(long)]
    threads: Option<String>,

    /// Log format: pretty or json
    #[arg(long, default_value = "pretty")]
    log_format: TelemetryFormat,

    /// Output format of the summary: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry(args.log_format).map_err(|e| anyhow::anyhow!(e))?;

    let config = Config::from_env().context("Failed to load configuration")?;
    let client = DataManagementApiClient::from_settings(&config.batch)?;
    let sinks = BatchSinks::open(&config.batch.failed_records_file, &config.batch.error_log_file)
        .await
        .context("Failed to open failure sinks")?;

    let pipeline = BatchCollectionDownloadPipeline::new(
        Arc::new(client),
        Arc::new(TokioFileSystem),
        Arc::new(sinks),
    );
    let request = BatchDownloadRequest {
        source_collection: args.source_collection,
        destination_dir: args.destination,
        threads: args.threads.or(config.batch.threads),
    };

    let report = pipeline.run(&request).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!("Data objects: {}", report.total);
            println!("Downloaded:   {}", report.succeeded);
            println!("Failed:       {}", report.failed);
            for path in report.failed_paths() {
                println!("  {}", path);
            }
            if report.failed > 0 {
                println!(
                    "Failed records were appended to {}",
                    config.batch.failed_records_file.display()
                );
            }
        }
    }

    Ok(())
}
