use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use archiva_core::Config;
use archiva_db::{connect, TenantConfigRepository};
use archiva_infra::{init_telemetry, TelemetryFormat};
use archiva_services::ConfigurationLocator;

#[derive(Parser, Debug)]
#[command(name = "tenant_configs")]
#[command(about = "Load and validate tenant archive configurations")]
struct Args {
    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,

    /// Log format: pretty or json
    #[arg(long, default_value = "pretty")]
    log_format: TelemetryFormat,
}

#[derive(serde::Serialize)]
struct TenantSummary {
    config_id: String,
    tenant_code: String,
    base_path: String,
    archive_backend: String,
    backends: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry(args.log_format).map_err(|e| anyhow::anyhow!(e))?;

    let config = Config::from_env().context("Failed to load configuration")?;
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let pool = connect(database_url, config.db_max_connections).await?;

    let locator = ConfigurationLocator::new(Arc::new(TenantConfigRepository::new(pool)));
    locator
        .reload()
        .await
        .context("Tenant configurations are invalid")?;

    let mut summaries = Vec::new();
    for tenant_code in locator.get_tenant_codes().await? {
        let config_id = locator.get_config_id_by_tenant_code(&tenant_code).await?;
        let tenant = locator.get_config(&config_id).await?;
        let archive_backend = locator.get_archive_backend_type(&config_id).await?;

        let mut backends: Vec<String> = tenant
            .archive_configs
            .keys()
            .map(|backend| backend.to_string())
            .collect();
        backends.sort();

        summaries.push(TenantSummary {
            config_id,
            tenant_code,
            base_path: tenant.base_path.clone(),
            archive_backend: archive_backend.to_string(),
            backends,
        });
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summaries)?),
        _ => {
            println!(
                "{:<38} {:<12} {:<20} {:<16} BACKENDS",
                "CONFIG ID", "TENANT", "BASE PATH", "ARCHIVE"
            );
            for s in &summaries {
                println!(
                    "{:<38} {:<12} {:<20} {:<16} {}",
                    s.config_id,
                    s.tenant_code,
                    s.base_path,
                    s.archive_backend,
                    s.backends.join(",")
                );
            }
            println!("\n{} tenant configuration(s) loaded", summaries.len());
        }
    }

    Ok(())
}
