//! Address Import - command-line entry point

use addr_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use addr_ingest::combiner::DatasetSource;
use addr_ingest::config::IngestConfig;
use addr_ingest::dispatch::{IndexClient, JsonLinesIndexClient, NullIndexClient};
use addr_ingest::input::records_source;
use addr_ingest::schema::Schema;
use addr_ingest::{DatasetRegistry, ImportPipeline, ImportSummary, SourceSpec};
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "addr-ingest")]
#[command(
    author,
    version,
    about = "Import, normalize and deduplicate addresses from multiple datasets"
)]
#[command(arg_required_else_help = true)]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["sources", "records"])))]
struct Cli {
    /// Import every file of dataset NAME found in DIR (repeatable)
    #[arg(long = "source", num_args = 2, value_names = ["NAME", "DIR"], action = ArgAction::Append)]
    sources: Vec<String>,

    /// JSON-lines file of normalized records, or `-` for stdin
    #[arg(long, value_name = "PATH")]
    records: Option<PathBuf>,

    /// Write all log output to this file
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "import.log")]
    log_file: Option<PathBuf>,

    /// Write index documents here instead of stdout
    #[arg(long, value_name = "PATH", conflicts_with = "dry_run")]
    output: Option<PathBuf>,

    /// Index mapping that defines the persisted fields
    #[arg(long, value_name = "FILE", env = "INGEST_SCHEMA_PATH")]
    schema: Option<PathBuf>,

    /// Three-letter country code stamped on every record
    #[arg(long, env = "INGEST_COUNTRY_CODE")]
    country_code: Option<String>,

    #[arg(long, env = "INGEST_INDEX_NAME")]
    index_name: Option<String>,

    #[arg(long, env = "INGEST_DOCUMENT_TYPE")]
    document_type: Option<String>,

    /// Records buffered per pipeline stage
    #[arg(long, env = "INGEST_HIGH_WATER_MARK")]
    high_water_mark: Option<usize>,

    #[arg(long, env = "INGEST_PROGRESS_INTERVAL_SECS")]
    progress_interval_secs: Option<u64>,

    /// Coordinate decimal places used for duplicate detection
    #[arg(long, env = "INGEST_DEDUP_PRECISION")]
    dedup_precision: Option<u32>,

    /// Run the whole pipeline but discard index documents
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn source_specs(&self) -> Vec<SourceSpec> {
        self.sources
            .chunks(2)
            .filter_map(|pair| match pair {
                [name, dir] => Some(SourceSpec::new(name.as_str(), dir.as_str())),
                _ => None,
            })
            .collect()
    }

    fn ingest_config(&self) -> Result<IngestConfig> {
        let defaults = IngestConfig::default();
        let config = IngestConfig::builder()
            .index_name(self.index_name.clone().unwrap_or(defaults.index_name))
            .document_type(self.document_type.clone().unwrap_or(defaults.document_type))
            .country_code(self.country_code.clone().unwrap_or(defaults.country_code))
            .high_water_mark(self.high_water_mark.unwrap_or(defaults.high_water_mark))
            .progress_interval_secs(
                self.progress_interval_secs
                    .unwrap_or(defaults.progress_interval_secs),
            )
            .dedup_precision(self.dedup_precision.unwrap_or(defaults.dedup_precision))
            .schema_path(self.schema.clone())
            .build()?;
        Ok(config)
    }
}

fn parse_cli() -> std::result::Result<Cli, clap::Error> {
    let datasets = DatasetRegistry::builtin().names().join(", ");
    let matches = Cli::command()
        .after_help(format!("Supported datasets, in processing order: {}", datasets))
        .try_get_matches()?;
    Cli::from_arg_matches(&matches)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Values from .env feed clap's `env` fallbacks
    let _ = dotenvy::dotenv();

    let cli = match parse_cli() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            return code;
        },
    };

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut log_config = match &cli.log_file {
        Some(path) => LogConfig::for_log_file(path),
        None => LogConfig::builder()
            .output(LogOutput::Console)
            .log_file_prefix("addr-ingest")
            .build(),
    };
    log_config.level = level;

    // Merge with environment variables (they take precedence)
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {:#}", e);
            log_config
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    match run(cli).await {
        Ok(summary) => {
            if summary.failed_datasets().next().is_some() {
                info!("Import finished with failed datasets, see log for details");
            }
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!(error = %format!("{:#}", e), "Import failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<ImportSummary> {
    let config = cli.ingest_config().context("Invalid configuration")?;

    let datasets = DatasetRegistry::builtin().resolve(&cli.source_specs())?;

    let schema = match &config.schema_path {
        Some(path) => Schema::load(path, &config.document_type).await?,
        None => Schema::address_default(),
    };

    let mut sources: Vec<DatasetSource> = datasets.into_iter().map(DatasetSource::from).collect();
    if let Some(path) = &cli.records {
        sources.push(records_source(path).await?);
    }

    let index: Arc<dyn IndexClient> = match (&cli.output, cli.dry_run) {
        (_, true) => Arc::new(NullIndexClient::new()),
        (Some(path), false) => Arc::new(JsonLinesIndexClient::create(path).await?),
        (None, false) => Arc::new(JsonLinesIndexClient::stdout()),
    };

    info!(
        datasets = sources.len(),
        schema_fields = schema.fields().len(),
        dry_run = cli.dry_run,
        "Configured address import"
    );

    ImportPipeline::new(config, index)
        .with_schema(&schema)
        .run(sources)
        .await
        .context("Address import failed")
}
