//! Media synthesis and capture extraction.
//!
//! [`MediaTool`] is the seam between the pipeline and the encoder. The
//! production implementation, [`FfmpegTool`], drives ffmpeg's `lavfi` test
//! source for synthesis and its `fps` filter for extraction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};

/// File name prefix of every capture written by extraction.
pub const CAPTURE_PREFIX: &str = "capture";

/// File extension of every capture written by extraction.
pub const CAPTURE_EXTENSION: &str = "jpg";

/// Parameters for synthesizing the test artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: u64,
    pub output: PathBuf,
}

impl SynthesisSpec {
    pub fn from_config(config: &sw_core::Config) -> sw_core::Result<Self> {
        let (width, height) = config
            .media
            .dimensions()
            .map_err(sw_core::Error::Config)?;
        Ok(Self {
            width,
            height,
            fps: config.media.fps,
            duration_secs: config.media.duration_secs,
            output: config.paths.artifact.clone(),
        })
    }
}

/// Parameters for extracting periodic captures from the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSpec {
    pub artifact: PathBuf,
    pub capture_dir: PathBuf,
    pub interval_secs: u64,
}

impl ExtractionSpec {
    pub fn from_config(config: &sw_core::Config) -> Self {
        Self {
            artifact: config.paths.artifact.clone(),
            capture_dir: config.paths.capture_dir.clone(),
            interval_secs: config.media.capture_interval_secs,
        }
    }

    /// ffmpeg output pattern, e.g. `<dir>/capture%03d.jpg`.
    pub fn output_pattern(&self) -> PathBuf {
        self.capture_dir
            .join(format!("{CAPTURE_PREFIX}%03d.{CAPTURE_EXTENSION}"))
    }
}

/// The external media collaborator.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Write one synthetic video with an on-frame timestamp to `spec.output`.
    async fn synthesize(&self, spec: &SynthesisSpec) -> sw_core::Result<()>;

    /// Write numbered captures of `spec.artifact` into `spec.capture_dir`.
    async fn extract(&self, spec: &ExtractionSpec) -> sw_core::Result<()>;
}

/// [`MediaTool`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    program: PathBuf,
    font_file: Option<PathBuf>,
    timeout: Duration,
}

impl FfmpegTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            font_file: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builder: font used by the timestamp overlay.
    pub fn with_font_file(mut self, font_file: Option<PathBuf>) -> Self {
        self.font_file = font_file;
        self
    }

    /// Builder: per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn overlay_filter(&self) -> String {
        let font = self
            .font_file
            .as_deref()
            .map(|p| format!("fontfile='{}':", p.display()))
            .unwrap_or_default();
        format!(
            "drawtext={font}text='%{{localtime}}':x=(w-tw)/2:y=h-(2*lh):fontcolor=white:fontsize=12:box=1:boxcolor=black@0.5"
        )
    }

    /// Arguments for [`MediaTool::synthesize`].
    pub fn synthesis_args(&self, spec: &SynthesisSpec) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-y".into(),
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!(
                "testsrc=duration={}:size={}x{}:rate={}",
                spec.duration_secs, spec.width, spec.height, spec.fps
            ),
            "-vf".into(),
            self.overlay_filter(),
            path_arg(&spec.output),
        ]
    }

    /// Arguments for [`MediaTool::extract`].
    pub fn extraction_args(&self, spec: &ExtractionSpec) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-y".into(),
            "-i".into(),
            path_arg(&spec.artifact),
            "-vf".into(),
            format!("fps=1/{}", spec.interval_secs),
            path_arg(&spec.output_pattern()),
        ]
    }

    async fn run(&self, args: Vec<String>) -> sw_core::Result<()> {
        ToolCommand::new(self.program.clone())
            .args(args)
            .timeout(self.timeout)
            .execute()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn synthesize(&self, spec: &SynthesisSpec) -> sw_core::Result<()> {
        tracing::info!(
            output = %spec.output.display(),
            duration_secs = spec.duration_secs,
            "Synthesizing test video"
        );
        self.run(self.synthesis_args(spec)).await
    }

    async fn extract(&self, spec: &ExtractionSpec) -> sw_core::Result<()> {
        tokio::fs::create_dir_all(&spec.capture_dir).await?;
        tracing::info!(
            artifact = %spec.artifact.display(),
            interval_secs = spec.interval_secs,
            "Extracting captures"
        );
        self.run(self.extraction_args(spec)).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
