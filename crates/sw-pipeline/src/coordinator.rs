//! Stage sequencing for one pipeline run.
//!
//! Each stage runs in its own task. Synthesize, Extract and BuildManifest
//! form a chain gated by one-shot completion signals; BuildManifest then
//! signals both upload tasks, which run concurrently and are awaited through
//! a [`JoinSet`] before the terminal wait.
//!
//! Stage failures never stop the chain: a failed synthesis or extraction is
//! logged and the next stage works with whatever is on disk.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::Instrument;

use sw_av::{ExtractionSpec, MediaTool, SynthesisSpec};
use sw_core::Config;
use sw_transfer::TransferSession;

use crate::manifest::{ManifestBuilder, ManifestOutcome};
use crate::upload::{upload_captures, upload_manifest, BatchReport};

/// The stages of a run, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Synthesize,
    Extract,
    BuildManifest,
    UploadCaptures,
    UploadManifest,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Synthesize => "synthesize",
            Stage::Extract => "extract",
            Stage::BuildManifest => "build-manifest",
            Stage::UploadCaptures => "upload-captures",
            Stage::UploadManifest => "upload-manifest",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// `None` when building the manifest failed outright.
    pub manifest: Option<ManifestOutcome>,
    pub captures: BatchReport,
    pub manifest_upload: BatchReport,
}

impl RunReport {
    pub fn failed_uploads(&self) -> usize {
        self.captures.failed() + self.manifest_upload.failed()
    }
}

/// Wait for the predecessor's completion signal.
///
/// A dropped sender means the predecessor task died; the stage still runs.
async fn await_signal(stage: Stage, signal: oneshot::Receiver<()>) {
    if signal.await.is_err() {
        tracing::warn!(%stage, "Predecessor finished without signalling; continuing");
    }
}

/// Runs the four pipeline stages against one shared session.
pub struct StageCoordinator {
    config: Arc<Config>,
    media: Arc<dyn MediaTool>,
    session: Arc<TransferSession>,
    linger: Duration,
}

impl StageCoordinator {
    /// The terminal wait defaults to the configured media duration.
    pub fn new(
        config: Arc<Config>,
        media: Arc<dyn MediaTool>,
        session: Arc<TransferSession>,
    ) -> Self {
        let linger = config.media.duration();
        Self {
            config,
            media,
            session,
            linger,
        }
    }

    /// Builder: override the wait after both upload batches finish.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Run every stage and return the per-file upload outcomes.
    ///
    /// # Errors
    ///
    /// Only a configuration that cannot be turned into stage parameters
    /// fails the run; stage failures are logged and reflected in the report.
    pub async fn run(&self) -> sw_core::Result<RunReport> {
        let synthesis = SynthesisSpec::from_config(&self.config)?;
        let extraction = ExtractionSpec::from_config(&self.config);
        let builder = ManifestBuilder::from_config(&self.config);

        let (synthesized_tx, synthesized_rx) = oneshot::channel::<()>();
        let (extracted_tx, extracted_rx) = oneshot::channel::<()>();
        let (captures_ready_tx, captures_ready_rx) = oneshot::channel::<()>();
        let (manifest_ready_tx, manifest_ready_rx) = oneshot::channel::<()>();

        let media = Arc::clone(&self.media);
        let synthesize = tokio::spawn(
            async move {
                tracing::info!("Stage started");
                if let Err(e) = media.synthesize(&synthesis).await {
                    tracing::error!(error = %e, "Synthesis failed; continuing with existing output");
                }
                let _ = synthesized_tx.send(());
            }
            .instrument(tracing::info_span!("stage", stage = %Stage::Synthesize)),
        );

        let media = Arc::clone(&self.media);
        let extract = tokio::spawn(
            async move {
                await_signal(Stage::Extract, synthesized_rx).await;
                tracing::info!("Stage started");
                if let Err(e) = media.extract(&extraction).await {
                    tracing::error!(error = %e, "Extraction failed; continuing with existing captures");
                }
                let _ = extracted_tx.send(());
            }
            .instrument(tracing::info_span!("stage", stage = %Stage::Extract)),
        );

        let build_manifest = tokio::spawn(
            async move {
                await_signal(Stage::BuildManifest, extracted_rx).await;
                tracing::info!("Stage started");
                let outcome = match tokio::task::spawn_blocking(move || builder.build()).await {
                    Ok(Ok(outcome)) => Some(outcome),
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "Manifest generation failed");
                        None
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Manifest task panicked");
                        None
                    }
                };
                let _ = captures_ready_tx.send(());
                let _ = manifest_ready_tx.send(());
                outcome
            }
            .instrument(tracing::info_span!("stage", stage = %Stage::BuildManifest)),
        );

        let upload_dir = self.config.remote.upload_dir.clone();
        let mut uploads = JoinSet::new();

        let session = Arc::clone(&self.session);
        let capture_dir = self.config.paths.capture_dir.clone();
        let pacing = self.config.media.capture_interval();
        let dir = upload_dir.clone();
        uploads.spawn(
            async move {
                await_signal(Stage::UploadCaptures, captures_ready_rx).await;
                let report = upload_captures(&session, &capture_dir, &dir, pacing).await;
                (Stage::UploadCaptures, report)
            }
            .instrument(tracing::info_span!("stage", stage = %Stage::UploadCaptures)),
        );

        let session = Arc::clone(&self.session);
        let manifest_path = self.config.paths.manifest.clone();
        uploads.spawn(
            async move {
                await_signal(Stage::UploadManifest, manifest_ready_rx).await;
                let report = upload_manifest(&session, &manifest_path, &upload_dir).await;
                (Stage::UploadManifest, report)
            }
            .instrument(tracing::info_span!("stage", stage = %Stage::UploadManifest)),
        );

        let mut report = RunReport::default();
        while let Some(joined) = uploads.join_next().await {
            match joined {
                Ok((Stage::UploadCaptures, batch)) => report.captures = batch,
                Ok((_, batch)) => report.manifest_upload = batch,
                Err(e) => tracing::error!(error = %e, "Upload task failed"),
            }
        }

        // The signal chain guarantees these have finished; reap them.
        for (stage, handle) in [(Stage::Synthesize, synthesize), (Stage::Extract, extract)] {
            if let Err(e) = handle.await {
                tracing::error!(%stage, error = %e, "Stage task failed");
            }
        }
        report.manifest = build_manifest.await.unwrap_or_else(|e| {
            tracing::error!(stage = %Stage::BuildManifest, error = %e, "Stage task failed");
            None
        });

        if !self.linger.is_zero() {
            tracing::info!(secs = self.linger.as_secs(), "Uploads finished; waiting out run duration");
            tokio::time::sleep(self.linger).await;
        }

        tracing::info!(
            captures_uploaded = report.captures.succeeded(),
            captures_failed = report.captures.failed(),
            manifest_uploaded = report.manifest_upload.succeeded() == 1,
            "Pipeline run complete"
        );

        Ok(report)
    }
}
