//! Command implementations for the `stillwire` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use sw_av::{FfmpegTool, MediaTool, ToolRegistry};
use sw_core::Config;
use sw_pipeline::StageCoordinator;
use sw_transfer::{Connector, FtpsConnector, MemoryConnector, SessionSettings, TransferSession};

/// Files tried, in order, when no `--config` is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./configuration.json",
    "./stillwire.toml",
    "~/.config/stillwire/config.toml",
];

/// The explicit path, or the first default location that exists.
fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
        .with_context(|| {
            format!(
                "no configuration file found (tried {})",
                DEFAULT_CONFIG_PATHS.join(", ")
            )
        })
}

fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    let path = resolve_config_path(explicit)?;
    let config = Config::load(&path)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok((path, config))
}

fn prepare_directories(config: &Config) -> Result<()> {
    let mut dirs = vec![
        config.paths.output_dir.as_path(),
        config.paths.capture_dir.as_path(),
    ];
    dirs.extend(
        [&config.paths.artifact, &config.paths.manifest]
            .into_iter()
            .filter_map(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty()),
    );

    for dir in dirs {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

fn media_tool(config: &Config) -> FfmpegTool {
    let registry = ToolRegistry::discover(&config.tools);
    let program = match registry.require("ffmpeg") {
        Ok(path) => path.to_path_buf(),
        Err(e) => {
            tracing::warn!(error = %e, "Media stages will fail until ffmpeg is installed");
            config
                .tools
                .ffmpeg_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("ffmpeg"))
        }
    };

    FfmpegTool::new(program)
        .with_font_file(config.tools.font_file.clone())
        .with_timeout(config.tools.timeout())
}

/// Execute one full pipeline run.
pub async fn run(config_path: Option<&Path>, dry_run: bool, clean: bool) -> Result<()> {
    let (path, config) = load_config(config_path)?;
    tracing::info!(config = %path.display(), dry_run, "Starting pipeline run");

    prepare_directories(&config)?;

    let memory = MemoryConnector::new();
    let connector: Box<dyn Connector> = if dry_run {
        Box::new(memory.clone())
    } else {
        Box::new(FtpsConnector::new().with_secure(config.remote.secure))
    };

    let settings = SessionSettings::from_config(&config);
    let session = TransferSession::establish(connector.as_ref(), &settings)
        .await
        .context("could not connect to the remote endpoint")?;
    let session = Arc::new(session);

    let config = Arc::new(config);
    let media: Arc<dyn MediaTool> = Arc::new(media_tool(&config));
    let outcome = StageCoordinator::new(Arc::clone(&config), media, Arc::clone(&session))
        .run()
        .await;

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close transfer session cleanly");
    }

    let report = outcome.context("pipeline run failed")?;

    println!(
        "Captures uploaded: {}/{}",
        report.captures.succeeded(),
        report.captures.attempted()
    );
    println!(
        "Manifest uploaded: {}",
        if report.manifest_upload.succeeded() == 1 { "yes" } else { "no" }
    );
    if report.failed_uploads() > 0 {
        println!("{} upload(s) failed; see log for details", report.failed_uploads());
    }
    if dry_run {
        println!("\n[DRY RUN] Recorded {} store(s):", memory.stored().len());
        for remote in memory.stored_paths() {
            println!("  {remote}");
        }
    }

    if clean {
        tracing::info!(dir = %config.paths.output_dir.display(), "Removing output directory");
        std::fs::remove_dir_all(&config.paths.output_dir).with_context(|| {
            format!("failed to remove {}", config.paths.output_dir.display())
        })?;
    }

    Ok(())
}

pub fn validate_config(config_path: Option<&Path>) -> Result<()> {
    let (path, config) = load_config(config_path)?;

    println!("Validating config: {}", path.display());
    println!("✓ Configuration is valid");
    println!(
        "  Media: {} @ {} fps, {}s, capture every {}s",
        config.media.resolution,
        config.media.fps,
        config.media.duration_secs,
        config.media.capture_interval_secs
    );
    println!(
        "  Remote: {}:{} (secure: {})",
        config.remote.host, config.remote.port, config.remote.secure
    );
    println!("  Upload dir: {}", config.remote.upload_dir);
    println!("  Output dir: {}", config.paths.output_dir.display());
    println!(
        "  Retry: {} attempt(s), {}s backoff",
        config.retry.max_attempts, config.retry.backoff_secs
    );
    for warning in config.warnings() {
        println!("  ! {warning}");
    }

    Ok(())
}

/// Report the external tools the pipeline needs.
///
/// Uses tool overrides from the configuration when one is found, defaults
/// otherwise.
pub fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let tools_config = match load_config(config_path) {
        Ok((_, config)) => config.tools,
        Err(e) if config_path.is_none() => {
            tracing::debug!(error = %e, "No usable configuration; using default tool lookup");
            Default::default()
        }
        Err(e) => return Err(e),
    };

    println!("Checking external tools...\n");

    let mut all_ok = true;
    for tool in ToolRegistry::discover(&tools_config).check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Media stages will fail without them.");
    }

    Ok(())
}
