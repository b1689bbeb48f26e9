//! In-memory transport.
//!
//! [`MemoryConnector`] never touches the network: every stored file is kept
//! as a [`StoredFile`] that can be inspected afterwards. `run --dry-run` uses
//! it to exercise the whole pipeline without a server. Failures can be
//! scripted (refused connects, stalled connects, rejected logins, rejected
//! stores) to drive the retry and partial-failure paths.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::{Connector, Credentials, Endpoint, RemoteConnection};

/// A file received by a [`MemoryConnector`] connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub remote_path: String,
    pub contents: Vec<u8>,
}

#[derive(Default)]
struct Counters {
    connect_attempts: AtomicU32,
    login_attempts: AtomicU32,
    open: AtomicU32,
    closed: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    stored: Mutex<Vec<StoredFile>>,
}

/// [`Connector`] whose connections record stores in memory.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    stall_connects: u32,
    fail_connects: u32,
    fail_logins: u32,
    failing_paths: Arc<HashSet<String>>,
    store_delay: Duration,
    counters: Arc<Counters>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` connects never complete.
    pub fn stalling_connects(mut self, n: u32) -> Self {
        self.stall_connects = n;
        self
    }

    /// The `n` connects after any stalled ones are refused.
    pub fn failing_connects(mut self, n: u32) -> Self {
        self.fail_connects = n;
        self
    }

    /// The first `n` logins are rejected.
    pub fn failing_logins(mut self, n: u32) -> Self {
        self.fail_logins = n;
        self
    }

    /// Stores to `remote_path` are rejected.
    pub fn failing_store(mut self, remote_path: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failing_paths).insert(remote_path.into());
        self
    }

    /// Each store holds the connection for `delay` before completing.
    pub fn with_store_delay(mut self, delay: Duration) -> Self {
        self.store_delay = delay;
        self
    }

    pub fn connect_attempts(&self) -> u32 {
        self.counters.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn login_attempts(&self) -> u32 {
        self.counters.login_attempts.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed.
    pub fn open_connections(&self) -> u32 {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn closed_connections(&self) -> u32 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Highest number of stores observed running at the same time.
    pub fn max_concurrent_stores(&self) -> u32 {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every successful store, in completion order.
    pub fn stored(&self) -> Vec<StoredFile> {
        self.counters.stored.lock().clone()
    }

    /// Remote paths of every successful store, in completion order.
    pub fn stored_paths(&self) -> Vec<String> {
        self.counters
            .stored
            .lock()
            .iter()
            .map(|f| f.remote_path.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _timeout: Duration,
    ) -> sw_core::Result<Box<dyn RemoteConnection>> {
        let attempt = self.counters.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt <= self.stall_connects {
            std::future::pending::<()>().await;
        }
        if attempt.saturating_sub(self.stall_connects) <= self.fail_connects {
            return Err(sw_core::Error::transfer(
                endpoint.to_string(),
                "connection refused",
            ));
        }

        self.counters.open.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%endpoint, attempt, "In-memory connection opened");
        Ok(Box::new(MemoryConnection {
            connector: self.clone(),
            open: true,
            authenticated: false,
        }))
    }
}

struct MemoryConnection {
    connector: MemoryConnector,
    open: bool,
    authenticated: bool,
}

#[async_trait]
impl RemoteConnection for MemoryConnection {
    async fn authenticate(&mut self, credentials: &Credentials) -> sw_core::Result<()> {
        let counters = &self.connector.counters;
        let attempt = counters.login_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.connector.fail_logins {
            return Err(sw_core::Error::transfer(
                credentials.username.clone(),
                "530 login incorrect",
            ));
        }
        self.authenticated = true;
        Ok(())
    }

    async fn store(&mut self, remote_path: &str, mut source: File) -> sw_core::Result<u64> {
        if !self.open || !self.authenticated {
            return Err(sw_core::Error::transfer(remote_path, "not logged in"));
        }
        if self.connector.failing_paths.contains(remote_path) {
            return Err(sw_core::Error::transfer(remote_path, "550 permission denied"));
        }

        let counters = Arc::clone(&self.connector.counters);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.connector.store_delay.is_zero() {
            tokio::time::sleep(self.connector.store_delay).await;
        }

        let mut contents = Vec::new();
        let read = source.read_to_end(&mut contents);
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        read?;

        let len = contents.len() as u64;
        tracing::info!(remote = remote_path, bytes = len, "Stored in memory");
        counters.stored.lock().push(StoredFile {
            remote_path: remote_path.to_string(),
            contents,
        });
        Ok(len)
    }

    async fn close(&mut self) -> sw_core::Result<()> {
        if self.open {
            self.open = false;
            let counters = &self.connector.counters;
            counters.open.fetch_sub(1, Ordering::SeqCst);
            counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "memory".into(),
            port: 21,
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "qa".into(),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn store_requires_login() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture001.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let connector = MemoryConnector::new();
        let mut conn = connector.connect(&endpoint(), Duration::ZERO).await.unwrap();
        let err = conn
            .store("upload/capture001.jpg", File::open(&path).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not logged in"));

        conn.authenticate(&credentials()).await.unwrap();
        let bytes = conn
            .store("upload/capture001.jpg", File::open(&path).unwrap())
            .await
            .unwrap();
        assert_eq!(bytes, 4);
        assert_eq!(
            connector.stored(),
            vec![StoredFile {
                remote_path: "upload/capture001.jpg".into(),
                contents: b"jpeg".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let connector = MemoryConnector::new().failing_connects(1).failing_logins(1);
        assert!(connector.connect(&endpoint(), Duration::ZERO).await.is_err());

        let mut conn = connector.connect(&endpoint(), Duration::ZERO).await.unwrap();
        assert!(conn.authenticate(&credentials()).await.is_err());
        assert!(conn.authenticate(&credentials()).await.is_ok());
        assert_eq!(connector.connect_attempts(), 2);
        assert_eq!(connector.login_attempts(), 2);
    }

    #[tokio::test]
    async fn failing_store_rejects_only_that_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"data").unwrap();

        let connector = MemoryConnector::new().failing_store("upload/bad");
        let mut conn = connector.connect(&endpoint(), Duration::ZERO).await.unwrap();
        conn.authenticate(&credentials()).await.unwrap();
        assert!(conn.store("upload/bad", File::open(&path).unwrap()).await.is_err());
        assert!(conn.store("upload/good", File::open(&path).unwrap()).await.is_ok());
        assert_eq!(connector.stored_paths(), vec!["upload/good".to_string()]);
    }

    #[tokio::test]
    async fn close_tracks_open_connections() {
        let connector = MemoryConnector::new();
        let mut conn = connector.connect(&endpoint(), Duration::ZERO).await.unwrap();
        assert_eq!(connector.open_connections(), 1);
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(connector.open_connections(), 0);
        assert_eq!(connector.closed_connections(), 1);
    }
}
