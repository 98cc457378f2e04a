//! CLI for the leafgrab archive downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use leafgrab_core::config;
use std::path::PathBuf;

use commands::{run_discover, run_grab, run_sentinel};

/// Top-level CLI for the leafgrab archive downloader.
#[derive(Debug, Parser)]
#[command(name = "leafgrab")]
#[command(about = "leafgrab: discover and download every leaf of an archive collection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Discover the last valid leaf, then download every leaf of the collection.
    Grab {
        /// Collection identifier (e.g. sim_interview_2001-07_31_7).
        identifier: String,

        /// Directory to place the per-collection output folder in (default: current dir).
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Maximum concurrent leaf fetches (default from config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Upper bound for boundary discovery (default from config).
        #[arg(long, value_name = "N")]
        upper_bound: Option<u64>,
    },

    /// Run boundary discovery only and print the leaf count.
    Discover {
        /// Collection identifier.
        identifier: String,

        /// Upper bound for the search (default from config).
        #[arg(long, value_name = "N")]
        upper_bound: Option<u64>,
    },

    /// Fetch one leaf and print its SHA-256 (for configuring sentinel_sha256
    /// against a known-missing index).
    Sentinel {
        /// Collection identifier.
        identifier: String,

        /// Leaf index to fetch.
        index: u64,
    },
}

impl CliCommand {
    /// Parses argv, loads config, and dispatches to the subcommand.
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;

        match cli.command {
            CliCommand::Grab {
                identifier,
                out_dir,
                concurrency,
                upper_bound,
            } => run_grab(&cfg, &identifier, out_dir, concurrency, upper_bound),
            CliCommand::Discover {
                identifier,
                upper_bound,
            } => run_discover(&cfg, &identifier, upper_bound),
            CliCommand::Sentinel { identifier, index } => run_sentinel(&cfg, &identifier, index),
        }
    }
}
