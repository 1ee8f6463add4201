//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for exercising procsig runtime primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use procsig_common::{init_tracing, LogStream, ProcsigConfig, SinkKind};
use procsig_logging::{install_sink, TracingSink};
use procsig_rt::BackgroundExecutor;
use tracing::{debug, error};

mod bench;
mod resolve;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "procsig runtime control utility",
    long_about = None
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "PROCSIG_CONFIG",
        help = "Path to a procsig TOML configuration file"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Resolve a timed deferred computation")]
    Resolve(resolve::ResolveArgs),
    #[command(about = "Benchmark a trivial workload")]
    Bench(bench::BenchArgs),
    #[command(about = "Print the effective configuration")]
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match ProcsigConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            procsig_logging::init();
            error!(error = %err, "unable to load configuration");
            return Err(err);
        }
    };
    // stdout carries command output.
    config.logging.stream = LogStream::Stderr;
    let _log_guard = init_tracing("procsigctl", &config.logging)?;
    if config.diagnostics.sink == SinkKind::Tracing {
        install_sink(Arc::new(TracingSink::new()));
    }
    debug!(config = ?cli.config, "configuration resolved");

    match cli.command {
        Commands::Resolve(args) => {
            BackgroundExecutor::init_global(&config.runtime)?;
            resolve::run(args)?;
        }
        Commands::Bench(args) => {
            BackgroundExecutor::init_global(&config.runtime)?;
            bench::run(args, &config.benchmark)?;
        }
        Commands::Config => {
            let rendered = config
                .to_toml()
                .context("unable to render configuration")?;
            print!("{rendered}");
        }
    }
    Ok(())
}
