use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dbreplicator::registry::Slot;

/// dbreplicator: copy databases from an origin instance to a target instance
#[derive(Parser, Debug)]
#[command(
    name = "dbreplicator",
    version,
    about = "Replicate databases from an origin instance to a target instance.",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to the replication config file
    #[arg(short = 'c', long = "config", default_value = "replicator.toml", global = true)]
    pub config: PathBuf,

    /// Append log output to this file instead of stderr
    #[arg(long = "log-file", value_name = "path", global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one replication pass for every enabled backend
    Run {
        /// Restrict the run to these backend slots (repeatable)
        #[arg(long = "only", value_enum)]
        only: Vec<Slot>,

        /// Write a JSON report of per-backend outcomes to this file
        #[arg(long = "report", value_name = "path")]
        report: Option<PathBuf>,
    },

    /// List the registered backends and their configured endpoints
    Backends,

    /// Print CLI version
    Version,
}
