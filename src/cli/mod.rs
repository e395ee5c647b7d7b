//! CLI module for partition-rag
//!
//! Provides command-line parsing, colored output and the interactive
//! question loop. Uses clap for argument parsing and owo-colors for colored
//! terminal output.

pub mod output;
pub mod session;

use clap::Parser;
use std::path::PathBuf;

/// partition-rag - question answering over partitioned document indices
#[derive(Parser, Debug)]
#[command(
    name = "partition-rag",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Question answering over partitioned document indices",
    long_about = "Builds (or restores) one retrieval index per document partition, exposes each\n\
                  as a tool and answers questions spanning partitions through a sub-question router.\n\n\
                  Scenarios are defined in the configuration file and selected with -d.",
    after_help = "EXAMPLES:\n    \
                  partition-rag -d 0                     # Single index, plain answers\n    \
                  partition-rag -d 1                     # Single index, streamed answers\n    \
                  partition-rag -d 2                     # Per-year tools plus the aggregate tool\n    \
                  partition-rag -d 2 --config my.toml    # Use a custom config file"
)]
pub struct Cli {
    /// Scenario to run (matches `id` of a [[scenarios]] entry)
    #[arg(short = 'd', long = "scenario", value_name = "N")]
    pub scenario: u32,

    /// Path to the configuration file
    #[arg(short, long, default_value = "partition-rag.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
