mod cli;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use dbreplicator::config::Config;
use dbreplicator::ops;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run { only, report } => {
            let config = load_config(&cli.config)?;
            let run = ops::do_run(&config, &only, report.as_deref())?;
            if let Some(kind) = run.worst_error() {
                debug!(?kind, "Worst backend outcome");
            }
            Ok(run.exit_code())
        }
        Commands::Backends => {
            let config = load_config(&cli.config)?;
            ops::do_backends(&config)?;
            Ok(0)
        }
        Commands::Version => {
            ops::do_version();
            Ok(0)
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("invalid configuration in {}", path.display()))
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,dbreplicator={}", level)));

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to initialize logging: {}", e))
}
