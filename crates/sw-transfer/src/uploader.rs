//! Per-file push over an established [`TransferSession`].

use std::path::Path;

use crate::session::TransferSession;

/// Result of pushing one file. Logged by the caller, never escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Succeeded { bytes: u64 },
    Failed(String),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded { .. })
    }
}

/// Join a remote directory and a file name with `/`, whatever the local OS.
pub fn remote_join(dir: &str, name: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        if dir.starts_with('/') {
            format!("/{name}")
        } else {
            name.to_string()
        }
    } else {
        format!("{trimmed}/{name}")
    }
}

/// Push `local_path` to `remote_path`.
///
/// The local file is opened here and handed to the session, which drops it
/// when the store finishes or fails.
///
/// # Errors
///
/// Returns the open failure ([`sw_core::Error::Io`]) or the store failure,
/// whichever happens first.
pub async fn upload(
    session: &TransferSession,
    local_path: &Path,
    remote_path: &str,
) -> sw_core::Result<u64> {
    let file = tokio::fs::File::open(local_path).await?.into_std().await;
    session.store(remote_path, file).await
}

/// [`upload`] with the outcome logged instead of returned as an error.
pub async fn push(session: &TransferSession, local_path: &Path, remote_path: &str) -> UploadOutcome {
    match upload(session, local_path, remote_path).await {
        Ok(bytes) => {
            tracing::info!(
                file = %local_path.display(),
                remote = remote_path,
                bytes,
                "Uploaded"
            );
            UploadOutcome::Succeeded { bytes }
        }
        Err(e) => {
            tracing::error!(
                file = %local_path.display(),
                remote = remote_path,
                error = %e,
                "Upload failed"
            );
            UploadOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Credentials, Endpoint};
    use crate::memory::MemoryConnector;
    use crate::session::{SessionSettings, CONNECT_TIMEOUT};
    use std::sync::Arc;
    use std::time::Duration;

    async fn session(connector: &MemoryConnector) -> TransferSession {
        let settings = SessionSettings {
            endpoint: Endpoint {
                host: "memory".into(),
                port: 21,
            },
            credentials: Credentials {
                username: "qa".into(),
                password: "pw".into(),
            },
            max_attempts: 1,
            retry_interval: Duration::ZERO,
            connect_timeout: CONNECT_TIMEOUT,
        };
        TransferSession::establish(connector, &settings).await.unwrap()
    }

    #[test]
    fn remote_join_variants() {
        assert_eq!(remote_join("upload", "a.jpg"), "upload/a.jpg");
        assert_eq!(remote_join("upload/", "a.jpg"), "upload/a.jpg");
        assert_eq!(remote_join("/srv/in", "a.jpg"), "/srv/in/a.jpg");
        assert_eq!(remote_join("/", "a.jpg"), "/a.jpg");
        assert_eq!(remote_join("", "a.jpg"), "a.jpg");
    }

    #[tokio::test]
    async fn upload_streams_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture001.jpg");
        std::fs::write(&path, b"\xff\xd8jpeg").unwrap();

        let connector = MemoryConnector::new();
        let session = session(&connector).await;
        let bytes = upload(&session, &path, "upload/capture001.jpg").await.unwrap();
        assert_eq!(bytes, 6);
        assert_eq!(connector.stored()[0].contents, b"\xff\xd8jpeg".to_vec());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MemoryConnector::new();
        let session = session(&connector).await;
        let err = upload(&session, &dir.path().join("gone.jpg"), "upload/gone.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, sw_core::Error::Io { .. }));
        assert!(connector.stored().is_empty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn push_reports_store_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.csv");
        std::fs::write(&path, b"Filename,Creation Time\n").unwrap();

        let connector = MemoryConnector::new().failing_store("upload/metadata.csv");
        let session = session(&connector).await;
        let outcome = push(&session, &path, "upload/metadata.csv").await;
        match outcome {
            UploadOutcome::Failed(reason) => assert!(reason.contains("550")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_pushes_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MemoryConnector::new().with_store_delay(Duration::from_millis(20));
        let session = Arc::new(session(&connector).await);

        let mut handles = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("capture{i:03}.jpg"));
            std::fs::write(&path, b"x").unwrap();
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                push(&session, &path, &format!("upload/capture{i:03}.jpg")).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_success());
        }

        assert_eq!(connector.stored().len(), 4);
        assert_eq!(connector.max_concurrent_stores(), 1);
        session.close().await.unwrap();
    }
}
