//! FTP over explicit TLS, backed by `suppaftp`.
//!
//! suppaftp's client is blocking, so every network operation runs on the
//! blocking pool. The stream is moved into the blocking task and handed back
//! when it finishes; a connection whose task panicked is treated as lost.

use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream};

use crate::connection::{Connector, Credentials, Endpoint, RemoteConnection};

/// [`Connector`] for FTPS (AUTH TLS) endpoints.
#[derive(Debug, Clone)]
pub struct FtpsConnector {
    secure: bool,
}

impl FtpsConnector {
    /// Connector that upgrades every control connection to TLS.
    pub fn new() -> Self {
        Self { secure: true }
    }

    /// Builder: skip the TLS upgrade (lab servers without certificates).
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

impl Default for FtpsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for FtpsConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> sw_core::Result<Box<dyn RemoteConnection>> {
        let host = endpoint.host.clone();
        let port = endpoint.port;
        let secure = self.secure;
        let label = endpoint.to_string();

        let stream = tokio::task::spawn_blocking(move || open_stream(&host, port, timeout, secure))
            .await
            .map_err(|e| sw_core::Error::Internal(format!("connect task failed: {e}")))?
            .map_err(|e| ftp_error(&label, e))?;

        tracing::debug!(endpoint = %label, secure, "Control connection open");
        Ok(Box::new(FtpsConnection {
            label,
            stream: Some(stream),
        }))
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, FtpError> {
    (host, port)
        .to_socket_addrs()
        .map_err(FtpError::ConnectionError)?
        .next()
        .ok_or_else(|| {
            FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address for {host}"),
            ))
        })
}

/// Connect, read the greeting and optionally upgrade to TLS.
///
/// The control socket carries `timeout` as its read and write timeout, so a
/// server that accepts but never greets or never finishes the handshake
/// fails the attempt instead of pinning a blocking thread.
fn open_stream(
    host: &str,
    port: u16,
    timeout: Duration,
    secure: bool,
) -> Result<NativeTlsFtpStream, FtpError> {
    let addr = resolve(host, port)?;
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(FtpError::ConnectionError)?;
    tcp.set_read_timeout(Some(timeout))
        .and_then(|_| tcp.set_write_timeout(Some(timeout)))
        .map_err(FtpError::ConnectionError)?;
    let stream = NativeTlsFtpStream::connect_with_stream(tcp)?;
    if !secure {
        return Ok(stream);
    }
    let tls = TlsConnector::new().map_err(|e| FtpError::SecureError(e.to_string()))?;
    stream.into_secure(NativeTlsConnector::from(tls), host)
}

fn ftp_error(target: &str, e: FtpError) -> sw_core::Error {
    sw_core::Error::transfer(target, e.to_string())
}

struct FtpsConnection {
    label: String,
    stream: Option<NativeTlsFtpStream>,
}

impl FtpsConnection {
    /// Run `op` against the stream on the blocking pool.
    async fn with_stream<T, F>(&mut self, target: &str, op: F) -> sw_core::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut NativeTlsFtpStream) -> Result<T, FtpError> + Send + 'static,
    {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| sw_core::Error::transfer(target, "connection lost"))?;

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| sw_core::Error::Internal(format!("transfer task failed: {e}")))?;

        self.stream = Some(stream);
        result.map_err(|e| ftp_error(target, e))
    }
}

#[async_trait]
impl RemoteConnection for FtpsConnection {
    async fn authenticate(&mut self, credentials: &Credentials) -> sw_core::Result<()> {
        let username = credentials.username.clone();
        let password = credentials.password.clone();
        let label = self.label.clone();
        self.with_stream(&label, move |s| {
            s.login(&username, &password)?;
            s.transfer_type(FileType::Binary)
        })
        .await
    }

    async fn store(&mut self, remote_path: &str, source: File) -> sw_core::Result<u64> {
        let target = remote_path.to_string();
        self.with_stream(remote_path, move |s| {
            let mut reader = BufReader::new(source);
            s.put_file(&target, &mut reader)
        })
        .await
    }

    async fn close(&mut self) -> sw_core::Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let label = self.label.clone();
        tokio::task::spawn_blocking(move || stream.quit())
            .await
            .map_err(|e| sw_core::Error::Internal(format!("close task failed: {e}")))?
            .map_err(|e| ftp_error(&label, e))
    }
}
