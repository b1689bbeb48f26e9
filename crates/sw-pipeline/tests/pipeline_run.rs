//! End-to-end runs of the stage coordinator with a stub media tool and the
//! in-memory transport.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use sw_av::{ExtractionSpec, MediaTool, SynthesisSpec};
use sw_core::Config;
use sw_pipeline::{read_manifest, ManifestOutcome, StageCoordinator};
use sw_transfer::{MemoryConnector, SessionSettings, TransferSession};

/// Writes a dummy artifact and one capture per interval of its duration.
#[derive(Default)]
struct StubMedia {
    fail_synthesis: bool,
    fail_extraction: bool,
    events: Mutex<Vec<&'static str>>,
    duration_secs: Mutex<u64>,
}

#[async_trait]
impl MediaTool for StubMedia {
    async fn synthesize(&self, spec: &SynthesisSpec) -> sw_core::Result<()> {
        self.events.lock().push("synthesize");
        if self.fail_synthesis {
            return Err(sw_core::Error::tool("ffmpeg", "synthesis stub failure"));
        }
        *self.duration_secs.lock() = spec.duration_secs;
        std::fs::write(&spec.output, b"dummy artifact")?;
        Ok(())
    }

    async fn extract(&self, spec: &ExtractionSpec) -> sw_core::Result<()> {
        self.events.lock().push("extract");
        if self.fail_extraction {
            return Err(sw_core::Error::tool("ffmpeg", "extraction stub failure"));
        }
        if !spec.artifact.exists() {
            return Err(sw_core::Error::tool("ffmpeg", "artifact missing"));
        }
        std::fs::create_dir_all(&spec.capture_dir)?;
        let count = *self.duration_secs.lock() / spec.interval_secs;
        for i in 1..=count {
            std::fs::write(
                spec.capture_dir.join(format!("capture{i:03}.jpg")),
                format!("frame {i}"),
            )?;
        }
        Ok(())
    }
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.media.duration_secs = 2;
    config.media.capture_interval_secs = 1;
    config.remote.host = "memory".into();
    config.remote.username = "qa".into();
    config.remote.upload_dir = "incoming".into();
    config.retry.max_attempts = 3;
    config.retry.backoff_secs = 1;
    config.paths.output_dir = root.to_path_buf();
    config.paths.artifact = root.join("test_video.mp4");
    config.paths.capture_dir = root.join("captures");
    config.paths.manifest = root.join("metadata.csv");
    config.validate().unwrap();
    config
}

async fn establish(connector: &MemoryConnector, config: &Config) -> Arc<TransferSession> {
    let settings = SessionSettings::from_config(config);
    Arc::new(TransferSession::establish(connector, &settings).await.unwrap())
}

#[tokio::test(start_paused = true)]
async fn full_run_uploads_every_capture_and_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path()));
    let connector = MemoryConnector::new();
    let session = establish(&connector, &config).await;
    let media = Arc::new(StubMedia::default());

    let start = tokio::time::Instant::now();
    let report = StageCoordinator::new(Arc::clone(&config), media.clone(), Arc::clone(&session))
        .run()
        .await
        .unwrap();
    session.close().await.unwrap();

    assert_eq!(*media.events.lock(), ["synthesize", "extract"]);
    assert_eq!(report.manifest, Some(ManifestOutcome::Written { rows: 2 }));
    assert_eq!(report.captures.attempted(), 2);
    assert_eq!(report.failed_uploads(), 0);

    let records = read_manifest(&config.paths.manifest).unwrap();
    assert!(!records.is_empty());

    let mut stored = connector.stored_paths();
    stored.sort();
    assert_eq!(
        stored,
        [
            "incoming/capture001.jpg",
            "incoming/capture002.jpg",
            "incoming/metadata.csv"
        ]
    );

    // The uploaded manifest is the finished file, not a partial one.
    let uploaded = connector
        .stored()
        .into_iter()
        .find(|f| f.remote_path == "incoming/metadata.csv")
        .unwrap();
    assert_eq!(
        uploaded.contents,
        std::fs::read(&config.paths.manifest).unwrap()
    );

    // Capture pacing plus the terminal wait of the run duration.
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert_eq!(connector.open_connections(), 0);
}

#[tokio::test]
async fn failed_generation_degrades_without_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path()));
    let connector = MemoryConnector::new();
    let session = establish(&connector, &config).await;
    let media = Arc::new(StubMedia {
        fail_synthesis: true,
        ..Default::default()
    });

    let report = StageCoordinator::new(Arc::clone(&config), media.clone(), Arc::clone(&session))
        .with_linger(Duration::ZERO)
        .run()
        .await
        .unwrap();
    session.close().await.unwrap();

    // Extraction still ran after the failed synthesis and failed in turn.
    assert_eq!(*media.events.lock(), ["synthesize", "extract"]);
    assert_eq!(report.manifest, Some(ManifestOutcome::Skipped));
    assert!(!config.paths.manifest.exists());
    assert_eq!(report.captures.attempted(), 0);
    assert_eq!(report.manifest_upload.failed(), 1);
    assert!(connector.stored().is_empty());
}

#[tokio::test]
async fn leftover_captures_are_used_when_extraction_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path()));
    std::fs::create_dir_all(&config.paths.capture_dir).unwrap();
    std::fs::write(config.paths.capture_dir.join("capture001.jpg"), b"old").unwrap();

    let connector = MemoryConnector::new();
    let session = establish(&connector, &config).await;
    let media = Arc::new(StubMedia {
        fail_extraction: true,
        ..Default::default()
    });

    let report = StageCoordinator::new(Arc::clone(&config), media, Arc::clone(&session))
        .with_linger(Duration::ZERO)
        .run()
        .await
        .unwrap();
    session.close().await.unwrap();

    assert_eq!(report.manifest, Some(ManifestOutcome::Written { rows: 1 }));
    let mut stored = connector.stored_paths();
    stored.sort();
    assert_eq!(stored, ["incoming/capture001.jpg", "incoming/metadata.csv"]);
}

#[tokio::test]
async fn rejected_capture_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dir.path()));
    let connector = MemoryConnector::new().failing_store("incoming/capture001.jpg");
    let session = establish(&connector, &config).await;

    let report = StageCoordinator::new(
        Arc::clone(&config),
        Arc::new(StubMedia::default()),
        Arc::clone(&session),
    )
    .with_linger(Duration::ZERO)
    .run()
    .await
    .unwrap();
    session.close().await.unwrap();

    assert_eq!(report.captures.attempted(), 2);
    assert_eq!(report.captures.failed(), 1);
    assert_eq!(report.manifest_upload.succeeded(), 1);
    assert_eq!(report.failed_uploads(), 1);
}
