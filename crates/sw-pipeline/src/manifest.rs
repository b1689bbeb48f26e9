//! CSV manifest of the captures produced by one run.
//!
//! The file starts with the header `Filename,Creation Time` followed by one
//! row per capture in file-name order. The creation time is the capture's
//! modification time rendered in local time. A run with no captures writes
//! nothing.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::captures::{scan_captures, CaptureFile};

/// Name the manifest is stored under on the remote endpoint.
pub const REMOTE_MANIFEST_NAME: &str = "metadata.csv";

/// Header row of every manifest.
pub const MANIFEST_HEADER: [&str; 2] = ["Filename", "Creation Time"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f %z";

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub filename: String,
    pub created: String,
}

impl ManifestRecord {
    pub fn from_capture(capture: &CaptureFile) -> Self {
        Self {
            filename: capture.file_name(),
            created: format_timestamp(capture.modified),
        }
    }
}

/// Render a file time the way it appears in the manifest.
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string()
}

/// What [`ManifestBuilder::build`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestOutcome {
    /// The manifest was (re)written with this many data rows.
    Written { rows: usize },
    /// No captures were found; nothing was written.
    Skipped,
}

/// Builds the manifest for the captures in one directory.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    capture_dir: PathBuf,
    output: PathBuf,
}

impl ManifestBuilder {
    pub fn new(capture_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            capture_dir: capture_dir.into(),
            output: output.into(),
        }
    }

    pub fn from_config(config: &sw_core::Config) -> Self {
        Self::new(&config.paths.capture_dir, &config.paths.manifest)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Records for the captures currently on disk.
    pub fn records(&self) -> sw_core::Result<Vec<ManifestRecord>> {
        Ok(scan_captures(&self.capture_dir)?
            .iter()
            .map(ManifestRecord::from_capture)
            .collect())
    }

    /// Scan the capture directory and write the manifest.
    ///
    /// With no captures this logs a warning and leaves any existing file
    /// untouched.
    pub fn build(&self) -> sw_core::Result<ManifestOutcome> {
        let records = self.records()?;
        if records.is_empty() {
            tracing::warn!(
                capture_dir = %self.capture_dir.display(),
                "No capture files found; skipping manifest"
            );
            return Ok(ManifestOutcome::Skipped);
        }

        write_manifest(&self.output, &records)?;
        tracing::info!(
            manifest = %self.output.display(),
            rows = records.len(),
            "Manifest written"
        );
        Ok(ManifestOutcome::Written {
            rows: records.len(),
        })
    }
}

fn csv_error(path: &Path, e: csv::Error) -> sw_core::Error {
    sw_core::Error::Manifest(format!("{}: {e}", path.display()))
}

/// Write `records` under the standard header, replacing any existing file.
pub fn write_manifest(path: &Path, records: &[ManifestRecord]) -> sw_core::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    writer
        .write_record(MANIFEST_HEADER)
        .map_err(|e| csv_error(path, e))?;
    for record in records {
        writer
            .write_record([record.filename.as_str(), record.created.as_str()])
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse a manifest written by [`write_manifest`].
pub fn read_manifest(path: &Path) -> sw_core::Result<Vec<ManifestRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers = reader.headers().map_err(|e| csv_error(path, e))?;
    if headers.iter().ne(MANIFEST_HEADER) {
        return Err(sw_core::Error::Manifest(format!(
            "{}: unexpected header {:?}",
            path.display(),
            headers
        )));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| csv_error(path, e))?;
        records.push(ManifestRecord {
            filename: row.get(0).unwrap_or_default().to_string(),
            created: row.get(1).unwrap_or_default().to_string(),
        });
    }
    Ok(records)
}
