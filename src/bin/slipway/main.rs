//! Slipway CLI - incremental Solidity builds

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let color = !cli.no_color;

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, color),
        Commands::Clean(args) => commands::clean::execute(args),
        Commands::Cache(args) => commands::cache::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
