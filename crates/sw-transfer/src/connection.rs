//! The transport seam between [`TransferSession`](crate::TransferSession)
//! and a concrete file-transfer protocol.

use std::fmt;
use std::fs::File;
use std::time::Duration;

use async_trait::async_trait;

/// Network location of the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Login credentials. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens transport-level connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open an unauthenticated connection to `endpoint`.
    ///
    /// Implementations should give up after `timeout`; the session also
    /// enforces it from the outside.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> sw_core::Result<Box<dyn RemoteConnection>>;
}

/// One open connection to the remote endpoint.
#[async_trait]
pub trait RemoteConnection: Send {
    /// Log in with `credentials`.
    async fn authenticate(&mut self, credentials: &Credentials) -> sw_core::Result<()>;

    /// Store the whole of `source` at `remote_path`, returning bytes written.
    ///
    /// The file is owned by the call and closed when it returns, whatever
    /// the outcome.
    async fn store(&mut self, remote_path: &str, source: File) -> sw_core::Result<u64>;

    /// Close the connection. Calling it again is a no-op.
    async fn close(&mut self) -> sw_core::Result<()>;
}
