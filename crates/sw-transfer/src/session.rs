//! Authenticated session with the remote endpoint.
//!
//! [`TransferSession::establish`] runs the bounded-retry protocol: each
//! attempt connects (bounded by [`CONNECT_TIMEOUT`]) and then logs in; a
//! failed attempt releases whatever it opened and, unless it was the last
//! one, sleeps for the configured backoff. The first successful attempt
//! wins and no further attempts are made.
//!
//! Once established, the session is shared behind an `Arc`. Stores are
//! serialized by an async mutex so exactly one transfer is in flight on the
//! connection at any time.

use std::fs::File;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::connection::{Connector, Credentials, Endpoint, RemoteConnection};

/// Per-attempt transport connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Inputs to [`TransferSession::establish`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    /// Pause between failed attempts.
    pub retry_interval: Duration,
    pub connect_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &sw_core::Config) -> Self {
        Self {
            endpoint: Endpoint {
                host: config.remote.host.clone(),
                port: config.remote.port,
            },
            credentials: Credentials {
                username: config.remote.username.clone(),
                password: config.remote.password.clone(),
            },
            max_attempts: config.retry.max_attempts,
            retry_interval: config.retry.backoff(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Connection state of a [`TransferSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// An authenticated connection to the remote endpoint.
pub struct TransferSession {
    endpoint: Endpoint,
    connection: Mutex<Option<Box<dyn RemoteConnection>>>,
}

impl std::fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSession")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TransferSession {
    /// Connect and authenticate, retrying up to `settings.max_attempts` times.
    ///
    /// # Errors
    ///
    /// Returns [`sw_core::Error::Connection`] naming the number of attempts
    /// made when none of them succeeded, or [`sw_core::Error::Config`] when
    /// `max_attempts` is 0.
    pub async fn establish(
        connector: &dyn Connector,
        settings: &SessionSettings,
    ) -> sw_core::Result<Self> {
        let max_attempts = settings.max_attempts;
        if max_attempts == 0 {
            return Err(sw_core::Error::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match Self::attempt(connector, settings).await {
                Ok(connection) => {
                    tracing::info!(
                        endpoint = %settings.endpoint,
                        attempt,
                        max_attempts,
                        "Session established"
                    );
                    return Ok(Self {
                        endpoint: settings.endpoint.clone(),
                        connection: Mutex::new(Some(connection)),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %settings.endpoint,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts && !settings.retry_interval.is_zero() {
                tokio::time::sleep(settings.retry_interval).await;
            }
        }

        Err(sw_core::Error::Connection {
            attempts: max_attempts,
            message: last_error,
        })
    }

    /// One connect + login attempt. A connection that fails to log in is
    /// closed before returning.
    async fn attempt(
        connector: &dyn Connector,
        settings: &SessionSettings,
    ) -> sw_core::Result<Box<dyn RemoteConnection>> {
        let endpoint = &settings.endpoint;
        let connect = connector.connect(endpoint, settings.connect_timeout);
        let mut connection = match tokio::time::timeout(settings.connect_timeout, connect).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(sw_core::Error::transfer(
                    endpoint.to_string(),
                    format!("connect timed out after {:?}", settings.connect_timeout),
                ))
            }
        };

        if let Err(e) = connection.authenticate(&settings.credentials).await {
            if let Err(close_err) = connection.close().await {
                tracing::debug!(error = %close_err, "Failed to close unauthenticated connection");
            }
            return Err(e);
        }

        Ok(connection)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current connection state.
    pub async fn state(&self) -> SessionState {
        if self.connection.lock().await.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// Store `source` at `remote_path`, waiting for any in-flight store.
    pub async fn store(&self, remote_path: &str, source: File) -> sw_core::Result<u64> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or_else(|| {
            sw_core::Error::transfer(remote_path, "session is disconnected")
        })?;
        connection.store(remote_path, source).await
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&self) -> sw_core::Result<()> {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return Ok(());
        };
        tracing::info!(endpoint = %self.endpoint, "Closing session");
        connection.close().await
    }
}

impl Drop for TransferSession {
    fn drop(&mut self) {
        if self.connection.get_mut().is_some() {
            tracing::warn!(endpoint = %self.endpoint, "Session dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;

    fn settings(max_attempts: u32, retry_interval: Duration) -> SessionSettings {
        SessionSettings {
            endpoint: Endpoint {
                host: "ftp.test".into(),
                port: 21,
            },
            credentials: Credentials {
                username: "qa".into(),
                password: "secret".into(),
            },
            max_attempts,
            retry_interval,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    #[tokio::test]
    async fn always_failing_connect_uses_every_attempt() {
        for n in 1..=5 {
            let connector = MemoryConnector::new().failing_connects(u32::MAX);
            let err = TransferSession::establish(&connector, &settings(n, Duration::ZERO))
                .await
                .unwrap_err();
            assert_eq!(connector.connect_attempts(), n);
            assert!(
                matches!(err, sw_core::Error::Connection { attempts, .. } if attempts == n),
                "unexpected error: {err}"
            );
            assert!(err.to_string().contains(&format!("after {n} attempts")));
        }
    }

    #[tokio::test]
    async fn succeeds_on_kth_attempt() {
        for k in 1..=4 {
            let connector = MemoryConnector::new().failing_connects(k - 1);
            let session = TransferSession::establish(&connector, &settings(4, Duration::ZERO))
                .await
                .unwrap();
            assert_eq!(connector.connect_attempts(), k);
            assert_eq!(session.state().await, SessionState::Connected);
            session.close().await.unwrap();
        }
    }

    #[tokio::test]
    async fn zero_attempts_rejected() {
        let connector = MemoryConnector::new();
        let err = TransferSession::establish(&connector, &settings(0, Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, sw_core::Error::Config(_)));
        assert_eq!(connector.connect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_only_between_failed_attempts() {
        let connector = MemoryConnector::new().failing_connects(2);
        let start = tokio::time::Instant::now();
        let session = TransferSession::establish(&connector, &settings(5, Duration::from_secs(10)))
            .await
            .unwrap();
        let elapsed = start.elapsed();
        // Two failures, two pauses, nothing after the success.
        assert!(elapsed >= Duration::from_secs(20), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(21), "elapsed {elapsed:?}");
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_does_not_sleep() {
        let connector = MemoryConnector::new().failing_connects(u32::MAX);
        let start = tokio::time::Instant::now();
        let result =
            TransferSession::establish(&connector, &settings(1, Duration::from_secs(30))).await;
        assert!(result.is_err());
        assert_eq!(connector.connect_attempts(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connect_times_out() {
        let connector = MemoryConnector::new().stalling_connects(1);
        let start = tokio::time::Instant::now();
        let session = TransferSession::establish(&connector, &settings(2, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(connector.connect_attempts(), 2);
        assert!(start.elapsed() >= CONNECT_TIMEOUT);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_login_closes_connection_before_retry() {
        let connector = MemoryConnector::new().failing_logins(2);
        let session = TransferSession::establish(&connector, &settings(3, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(connector.connect_attempts(), 3);
        assert_eq!(connector.closed_connections(), 2);
        assert_eq!(connector.open_connections(), 1);
        session.close().await.unwrap();
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_disconnects() {
        let connector = MemoryConnector::new();
        let session = TransferSession::establish(&connector, &settings(1, Duration::ZERO))
            .await
            .unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_eq!(connector.closed_connections(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        let err = session
            .store("upload/a.jpg", File::open(&path).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }

    #[test]
    fn settings_from_config() {
        let mut config = sw_core::Config::default();
        config.remote.host = "ftp.example.test".into();
        config.remote.port = 990;
        config.retry.max_attempts = 7;
        config.retry.backoff_secs = 2;
        let s = SessionSettings::from_config(&config);
        assert_eq!(s.endpoint.to_string(), "ftp.example.test:990");
        assert_eq!(s.max_attempts, 7);
        assert_eq!(s.retry_interval, Duration::from_secs(2));
        assert_eq!(s.connect_timeout, CONNECT_TIMEOUT);
    }
}
