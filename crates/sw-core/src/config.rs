//! Pipeline configuration types.
//!
//! The top-level [`Config`] is deserialized from JSON or TOML once at
//! startup and never mutated afterwards. Every section has sensible defaults
//! so a file only needs the remote endpoint and credentials, but unknown
//! keys are rejected and [`Config::validate`] is strict: an invalid
//! configuration is fatal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub media: MediaConfig,
    pub remote: RemoteConfig,
    pub paths: PathsConfig,
    pub retry: RetryConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Read, parse and validate a configuration file.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&contents)?,
            _ => Self::from_json(&contents)?,
        };

        config.validate()?;
        for warning in config.warnings() {
            tracing::warn!("{}: {warning}", path.display());
        }

        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// All problems are reported together in a single [`Error::Config`].
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Err(e) = self.media.dimensions() {
            problems.push(e);
        }
        if self.media.fps == 0 {
            problems.push("media.fps must be greater than 0".to_string());
        }
        if self.media.capture_interval_secs == 0 {
            problems.push("media.capture_interval_secs must be at least 1".to_string());
        }

        if self.remote.host.trim().is_empty() {
            problems.push("remote.host is empty".to_string());
        }
        if self.remote.port == 0 {
            problems.push("remote.port cannot be 0".to_string());
        }

        for (name, path) in [
            ("paths.output_dir", &self.paths.output_dir),
            ("paths.artifact", &self.paths.artifact),
            ("paths.capture_dir", &self.paths.capture_dir),
            ("paths.manifest", &self.paths.manifest),
        ] {
            if path.as_os_str().is_empty() {
                problems.push(format!("{name} is empty"));
            }
        }

        if self.retry.max_attempts == 0 {
            problems.push("retry.max_attempts must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }

    /// Return a list of non-fatal issues worth logging.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.remote.username.is_empty() {
            warnings.push("remote.username is empty; login will likely fail".into());
        }
        if !self.remote.secure {
            warnings.push("remote.secure is false; credentials are sent in clear text".into());
        }
        if self.remote.upload_dir.is_empty() {
            warnings.push("remote.upload_dir is empty; files land in the login directory".into());
        }
        if self.media.capture_interval_secs > self.media.duration_secs {
            warnings.push(format!(
                "media.capture_interval_secs ({}) exceeds media.duration_secs ({}); at most one capture will be produced",
                self.media.capture_interval_secs, self.media.duration_secs
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Synthetic media parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Frame size as `WIDTHxHEIGHT`.
    pub resolution: String,
    pub fps: u32,
    /// Length of the synthesized artifact. Also the terminal wait after uploads.
    pub duration_secs: u64,
    /// Seconds between captures; also the pause between capture uploads.
    ///
    /// Both uses are whole seconds. The upload pause is not a millisecond
    /// value, so a batch of N captures takes at least N intervals to upload.
    pub capture_interval_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            resolution: "1280x720".into(),
            fps: 30,
            duration_secs: 10,
            capture_interval_secs: 1,
        }
    }
}

impl MediaConfig {
    /// Parse [`resolution`](Self::resolution) into `(width, height)`.
    pub fn dimensions(&self) -> std::result::Result<(u32, u32), String> {
        let invalid = || {
            format!(
                "media.resolution '{}' is not of the form WIDTHxHEIGHT",
                self.resolution
            )
        };
        let (w, h) = self.resolution.split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok((width, height))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs(self.capture_interval_secs)
    }
}

/// Remote secure-transfer endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Remote directory every file is stored under.
    pub upload_dir: String,
    /// Upgrade the control connection with explicit TLS (AUTH TLS).
    pub secure: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 21,
            username: String::new(),
            password: String::new(),
            upload_dir: "upload".into(),
            secure: true,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("upload_dir", &self.upload_dir)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Local filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
    pub artifact: PathBuf,
    pub capture_dir: PathBuf,
    pub manifest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            artifact: PathBuf::from("output/test_video.mp4"),
            capture_dir: PathBuf::from("output/captures"),
            manifest: PathBuf::from("output/metadata.csv"),
        }
    }
}

/// Connection-establishment retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total connect/login attempts, at least 1.
    pub max_attempts: u32,
    /// Linear backoff between attempts, in seconds. 0 disables the pause.
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 5,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

/// External tool overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    /// Font used for the timestamp overlay; ffmpeg's default font when unset.
    pub font_file: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            font_file: None,
            timeout_secs: 300,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
