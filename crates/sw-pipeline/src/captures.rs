//! Enumeration of capture files written by the extraction stage.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use regex::Regex;
use sw_av::{CAPTURE_EXTENSION, CAPTURE_PREFIX};

/// A capture on disk and its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl CaptureFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn capture_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let pattern = format!(
            r"^{}\d+\.{}$",
            regex::escape(CAPTURE_PREFIX),
            regex::escape(CAPTURE_EXTENSION)
        );
        Regex::new(&pattern).expect("capture pattern is a valid regex")
    })
}

/// Whether `name` follows the capture naming pattern.
pub fn is_capture_name(name: &str) -> bool {
    capture_name_pattern().is_match(name)
}

/// Capture files in `dir`, sorted by file name.
///
/// A missing directory yields an empty list.
pub fn list_captures(dir: &Path) -> sw_core::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_capture_name(&name) && entry.file_type()?.is_file() {
            names.push(name);
        }
    }
    names.sort();

    Ok(names.into_iter().map(|n| dir.join(n)).collect())
}

/// [`list_captures`] plus modification times.
///
/// Files that disappear or cannot be stat'ed between listing and stat are
/// skipped with a warning.
pub fn scan_captures(dir: &Path) -> sw_core::Result<Vec<CaptureFile>> {
    let mut captures = Vec::new();
    for path in list_captures(dir)? {
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => captures.push(CaptureFile { path, modified }),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to read capture metadata")
            }
        }
    }
    Ok(captures)
}
