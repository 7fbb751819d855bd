#![warn(missing_docs)]

//! Tradevault: exchange log archive ingestion and settlement retrieval.

mod cli;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};
use config::VaultConfig;
use tradevault_fetch::{FetchConfig, PagedFetcher, RestConfig, RestSource, RetryPolicy};
use tradevault_ingest::{ArchiveOrchestrator, DirSource, FileSource, IngestConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Ingest {
            config,
            destination,
            file,
            source_dir,
            pattern,
            keep,
        } => ingest(&config, destination, file, source_dir, pattern, keep),
        Command::Fetch {
            config,
            output,
            days,
            page_size,
        } => fetch(&config, output, days, page_size).await,
    }
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "info",
        1 => "info,tradevault_ingest=debug,tradevault_fetch=debug,tradevault=debug",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn ingest(
    config_path: &std::path::Path,
    destination: PathBuf,
    file: Option<PathBuf>,
    source_dir: Option<PathBuf>,
    pattern: String,
    keep: bool,
) -> Result<()> {
    let config = VaultConfig::from_file(config_path)?;
    std::fs::create_dir_all(&destination)
        .with_context(|| format!("creating destination {}", destination.display()))?;

    let orchestrator = ArchiveOrchestrator::new(IngestConfig {
        password: config.archive.password,
        pattern,
        exclusion: tradevault_ingest::DEFAULT_EXCLUSION.to_string(),
        destination,
        keep,
    })
    .context("building the ingestion pipeline")?;

    let stats = match (file, source_dir) {
        (Some(path), _) => orchestrator.run(&mut FileSource::new(path))?,
        (None, Some(dir)) => {
            let mut source =
                DirSource::new(&dir).with_context(|| format!("listing spool {}", dir.display()))?;
            orchestrator.run(&mut source)?
        }
        (None, None) => anyhow::bail!("either --file or --source-dir is required"),
    };

    tracing::info!(
        processed = stats.processed,
        skipped = stats.skipped,
        failed = stats.failed,
        partitions = stats.partitions,
        "ingest finished"
    );
    Ok(())
}

async fn fetch(
    config_path: &std::path::Path,
    output: PathBuf,
    days: u32,
    page_size: u32,
) -> Result<()> {
    let config = VaultConfig::from_file(config_path)?;
    let settlement = config
        .settlement
        .context("configuration lacks a [settlement] section")?;

    let source = RestSource::new(RestConfig {
        endpoint: settlement.endpoint,
        app_key: settlement.app_key,
        session_token: settlement.session_token,
    });
    let fetcher = PagedFetcher::new(
        source,
        FetchConfig {
            days,
            page_size,
            output,
            retry: RetryPolicy::default(),
        },
    );

    let stats = fetcher.run().await.context("settlement retrieval failed")?;
    tracing::info!(
        windows_completed = stats.windows_completed,
        windows_abandoned = stats.windows_abandoned,
        pages = stats.pages,
        records = stats.records,
        "fetch finished"
    );
    Ok(())
}
