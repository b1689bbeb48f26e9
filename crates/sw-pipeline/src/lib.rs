//! # sw-pipeline
//!
//! The four-stage test-data pipeline.
//!
//! This crate provides:
//!
//! - **Capture enumeration** ([`captures`]) -- `captureNNN.jpg` files in
//!   lexicographic order with their modification times.
//! - **[`ManifestBuilder`]** -- writes the CSV manifest describing the
//!   captures, and reads it back.
//! - **Batch uploads** ([`upload`]) -- the capture batch and the manifest
//!   batch, each tolerant of per-file failures.
//! - **[`StageCoordinator`]** -- synthesize, extract and build the manifest
//!   in signal-gated order, then run both upload batches concurrently behind
//!   a join barrier.

pub mod captures;
pub mod coordinator;
pub mod manifest;
pub mod upload;

// Re-export key types at the crate root.
pub use captures::{list_captures, scan_captures, CaptureFile};
pub use coordinator::{RunReport, Stage, StageCoordinator};
pub use manifest::{
    read_manifest, write_manifest, ManifestBuilder, ManifestOutcome, ManifestRecord,
    REMOTE_MANIFEST_NAME,
};
pub use upload::{upload_captures, upload_files, upload_manifest, BatchReport};
