//! VPTS aggregation service.
//!
//! Two entry points:
//! - `aggregate`: read the storage inventory, rebuild the daily VPTS files of
//!   changed radar-days and the monthly files of their months
//! - `convert`: turn local ODIM VP files into one VPTS CSV file

mod config;
mod convert;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aggregation::{AggregationScheduler, DayJobState};
use storage::ObjectStorage;
use vpts_common::parse_timestamp;

use config::{Overrides, ServiceConfig};
use convert::ConvertOptions;

#[derive(Parser, Debug)]
#[command(name = "vpts-aggregator")]
#[command(about = "Convert ODIM vertical profiles to VPTS CSV and maintain daily/monthly aggregates")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild daily/monthly VPTS files from the latest storage inventory
    Aggregate(AggregateArgs),
    /// Convert local ODIM VP files into a single VPTS CSV file
    Convert(ConvertArgs),
}

#[derive(ClapArgs, Debug)]
struct AggregateArgs {
    /// Configuration file path
    #[arg(short, long, env = "VPTS_CONFIG")]
    config: Option<PathBuf>,

    /// Bucket with raw files and aggregated outputs
    #[arg(long, env = "DESTINATION_BUCKET")]
    destination_bucket: Option<String>,

    /// Bucket receiving the storage inventory
    #[arg(long, env = "INVENTORY_BUCKET")]
    inventory_bucket: Option<String>,

    /// Rebuild files modified in the last N days; 0 rebuilds everything
    #[arg(long, env = "MODIFIED_DAYS_AGO")]
    modified_days_ago: Option<u32>,

    /// S3 endpoint URL (for S3 compatible stores)
    #[arg(long, env = "S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Allow plain HTTP to the endpoint
    #[arg(long)]
    allow_http: bool,

    /// Reference instant of the run (RFC 3339); defaults to now
    #[arg(long)]
    now: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct ConvertArgs {
    /// ODIM VP file or directory searched recursively for *.h5
    input: PathBuf,

    /// Output CSV file
    #[arg(short, long)]
    output: PathBuf,

    /// VPTS CSV schema version
    #[arg(long, default_value = "v1.0")]
    schema_version: String,

    /// Also write a datapackage.json descriptor next to the CSV
    #[arg(long)]
    descriptor: bool,

    /// Drop rows repeating an earlier (radar, datetime, height)
    #[arg(long)]
    keep_first: bool,

    /// Parsing threads (default: available CPUs minus one)
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Aggregate(args) => aggregate(args).await,
        Command::Convert(args) => {
            let options = ConvertOptions {
                input: args.input,
                output: args.output,
                schema_version: args.schema_version,
                descriptor: args.descriptor,
                keep_first: args.keep_first,
                workers: args.workers,
            };
            tokio::task::spawn_blocking(move || convert::run(&options))
                .await
                .context("Conversion task panicked")?
        }
    }
}

async fn aggregate(args: AggregateArgs) -> Result<()> {
    info!("Starting VPTS aggregation");

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    config.apply(&Overrides {
        bucket: args.destination_bucket,
        inventory_bucket: args.inventory_bucket,
        modified_days_ago: args.modified_days_ago,
        endpoint: args.s3_endpoint,
        region: args.region,
        allow_http: args.allow_http,
    });

    let now = match &args.now {
        Some(text) => parse_timestamp(text).with_context(|| format!("Invalid --now {}", text))?,
        None => Utc::now(),
    };

    info!(
        bucket = %config.aggregation.bucket,
        inventory_bucket = %config.aggregation.inventory_bucket,
        modified_days_ago = config.aggregation.modified_days_ago,
        manifest = %config.aggregation.manifest_key(now),
        "Loaded configuration"
    );

    let data = ObjectStorage::new(&config.data_storage())?;
    let inventory = ObjectStorage::new(&config.inventory_storage())?;
    let scheduler = AggregationScheduler::new(config.aggregation, data, inventory)?;

    let report = scheduler.run(now).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_success() {
        bail!(
            "{} day groups and {} months failed",
            report.days_in_state(DayJobState::Failed),
            report.months_failed()
        );
    }
    Ok(())
}
