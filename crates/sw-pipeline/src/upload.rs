//! Capture and manifest upload batches.
//!
//! A batch walks its whole input list no matter how many pushes fail; the
//! per-file outcomes are logged and returned in a [`BatchReport`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use sw_transfer::{push, remote_join, TransferSession, UploadOutcome};

use crate::captures::list_captures;
use crate::manifest::REMOTE_MANIFEST_NAME;

/// Per-file outcomes of one batch, in attempt order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(PathBuf, UploadOutcome)>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }
}

/// Push each of `files` under `upload_dir`, pausing `pacing` after every push.
pub async fn upload_files(
    session: &TransferSession,
    files: &[PathBuf],
    upload_dir: &str,
    pacing: Duration,
) -> BatchReport {
    let mut report = BatchReport::default();

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let remote = remote_join(upload_dir, &name);
        let outcome = push(session, file, &remote).await;
        report.outcomes.push((file.clone(), outcome));

        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    report
}

/// Upload every capture in `capture_dir`.
pub async fn upload_captures(
    session: &TransferSession,
    capture_dir: &Path,
    upload_dir: &str,
    pacing: Duration,
) -> BatchReport {
    tracing::info!(capture_dir = %capture_dir.display(), "Uploading captures");

    let files = match list_captures(capture_dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::error!(capture_dir = %capture_dir.display(), error = %e, "Failed to list captures");
            return BatchReport::default();
        }
    };

    let report = upload_files(session, &files, upload_dir, pacing).await;
    tracing::info!(
        attempted = report.attempted(),
        failed = report.failed(),
        "Capture upload completed"
    );
    report
}

/// Upload the manifest as [`REMOTE_MANIFEST_NAME`] under `upload_dir`.
pub async fn upload_manifest(
    session: &TransferSession,
    manifest: &Path,
    upload_dir: &str,
) -> BatchReport {
    tracing::info!(manifest = %manifest.display(), "Uploading manifest");
    let remote = remote_join(upload_dir, REMOTE_MANIFEST_NAME);
    let outcome = push(session, manifest, &remote).await;
    BatchReport {
        outcomes: vec![(manifest.to_path_buf(), outcome)],
    }
}
