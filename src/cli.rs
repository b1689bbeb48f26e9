use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stillwire")]
#[command(author, version, about = "Synthetic media test-data pipeline")]
pub struct Cli {
    /// Path to config file (JSON or TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a test video, extract captures, write the manifest and upload everything
    Run {
        /// Record uploads in memory instead of contacting the remote endpoint
        #[arg(long)]
        dry_run: bool,

        /// Remove the local output directory once the run completes
        #[arg(long)]
        clean: bool,
    },

    /// Validate configuration file
    Validate,

    /// Check that required external tools are available
    CheckTools,
}
