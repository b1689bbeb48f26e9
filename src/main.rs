mod cli;
mod runner;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::time::Duration;

/// How long exit waits for blocking tasks left behind by the run.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stillwire=trace,sw_pipeline=trace,sw_transfer=trace,sw_av=debug,sw_core=debug,suppaftp=debug".to_string()
        } else {
            "stillwire=info,sw_pipeline=info,sw_transfer=info,sw_av=info,sw_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { dry_run, clean } => {
            let rt = tokio::runtime::Runtime::new()?;
            let result = rt.block_on(runner::run(cli.config.as_deref(), dry_run, clean));
            // Abandoned connect attempts may still hold blocking threads.
            rt.shutdown_timeout(SHUTDOWN_GRACE);
            result
        }
        Commands::Validate => runner::validate_config(cli.config.as_deref()),
        Commands::CheckTools => runner::check_tools(cli.config.as_deref()),
    }
}
