//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Slipway - an incremental build pipeline for Solidity smart contracts
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the project's contracts
    Build(BuildArgs),

    /// Remove build artifacts and the cache
    Clean(CleanArgs),

    /// Inspect or clear the compilation cache
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Ignore the cache and recompile everything
    #[arg(long)]
    pub force: bool,

    /// Number of parallel compiler jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cache entry count and on-disk sizes
    Stats,

    /// Drop the cache index (artifacts are kept)
    Clear,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
