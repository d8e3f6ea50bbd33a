//! ingest-data
//!
//! Reads an ndjson export, chunks every article, embeds the chunks and
//! upserts them into the configured vector store. Runs with no arguments;
//! every flag overrides a config file or environment setting.

use clap::Parser;
use docingest_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppResult,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// Chunk, embed and upsert an ndjson document export
#[derive(Parser, Debug)]
#[command(name = "ingest-data")]
#[command(about = "Chunk, embed and upsert an ndjson document export", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Newline-delimited JSON file to ingest (default: exported_data.ndjson)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log line format (pretty, json)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {
            println!("ingestion complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e.into_ingestion_failure());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // Load base configuration from file and environment
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Apply CLI overrides
    let mut config = config.with_overrides(cli.input, cli.log_level, cli.verbose, cli.no_color);
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.log_format, config.no_color)?;

    tracing::info!("ingest-data starting");
    tracing::debug!("Input: {:?}", config.input);
    tracing::debug!("Embedding provider: {}", config.embedding.provider);
    tracing::debug!("Vector store: {:?}", config.vector_store.kind);

    config.validate()?;

    let report = docingest::run(&config)
        .instrument(tracing::info_span!("command", name = "ingest"))
        .await?;

    tracing::info!(
        records = report.records,
        skipped = report.skipped,
        chunks = report.chunks,
        upserted = report.upserted,
        "Command completed successfully"
    );

    Ok(())
}
