//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the records of one or more export files through a filter
    View {
        /// Export files to load, merged in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Case-insensitive text to look for in message or source
        #[arg(short, long)]
        text: Option<String>,
        /// Hide records with exactly this source
        #[arg(short = 'x', long)]
        exclude_source: Option<String>,
        /// Only show records from this device
        #[arg(short, long)]
        device: Option<String>,
        /// Show the producers' internal transport records too
        #[arg(long)]
        include_internal: bool,
        /// Order by parsed timestamp instead of the raw string
        #[arg(long)]
        chronological: bool,
        /// Print the matching records as an export document
        #[arg(long)]
        json: bool,
        /// Print at most this many records (the newest ones)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Merge export files into one deduplicated, ordered export
    Merge {
        /// Export files to merge
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarize export files per device
    Stats {
        /// Export files to load
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print an example configuration file
    Example,
    /// Print the path the configuration is read from
    Path,
    /// Print the effective configuration
    Show,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
