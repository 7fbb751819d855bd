//! Command-line interface definition for the tradevault binary.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Exchange log archive ingestion and settlement retrieval.
#[derive(Parser)]
#[command(name = "tradevault")]
#[command(about = "Exchange log archive ingestion and settlement retrieval", long_about = None)]
pub struct Cli {
    /// Raise verbosity; repeat for library-level debug output.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Decrypt, unpack, classify and persist encrypted log archives.
    Ingest {
        /// Configuration file holding the archive password.
        #[arg(short, long)]
        config: PathBuf,
        /// Destination directory for partitions and interim files.
        #[arg(short, long)]
        destination: PathBuf,
        /// Read a single archive directly from a file.
        #[arg(short, long, conflicts_with = "source_dir")]
        file: Option<PathBuf>,
        /// Spool directory listing candidate archives.
        #[arg(short, long)]
        source_dir: Option<PathBuf>,
        /// Pattern used to select archives (e.g. '2025.*\.zst').
        #[arg(short, long, default_value = tradevault_ingest::DEFAULT_PATTERN)]
        pattern: String,
        /// Keep decrypted archives after extraction.
        #[arg(short, long)]
        keep: bool,
    },
    /// Page settled results backward through daily windows into a raw
    /// archive file.
    Fetch {
        /// Configuration file holding the settlement API credentials.
        #[arg(short, long)]
        config: PathBuf,
        /// Append-only output file for raw pages.
        #[arg(short, long)]
        output: PathBuf,
        /// Trailing days to cover.
        #[arg(short, long)]
        days: u32,
        /// Records requested per page.
        #[arg(long, default_value_t = tradevault_fetch::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
}
