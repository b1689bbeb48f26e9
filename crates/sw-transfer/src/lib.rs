//! # sw-transfer
//!
//! Delivery of pipeline output to the remote secure-transfer endpoint.
//!
//! This crate provides:
//!
//! - **Transport seam** ([`Connector`], [`RemoteConnection`]) -- connect,
//!   authenticate, store one file, close.
//! - **[`TransferSession`]** -- bounded-retry establishment with linear
//!   backoff, serialized stores, explicit close.
//! - **Uploader** ([`upload`], [`push`]) -- push one local file and report a
//!   per-file [`UploadOutcome`].
//! - **Transports** -- [`FtpsConnector`] (FTP over explicit TLS) and
//!   [`MemoryConnector`] (records stores in memory; dry runs and tests).

pub mod connection;
pub mod ftps;
pub mod memory;
pub mod session;
pub mod uploader;

// Re-export key types at the crate root.
pub use connection::{Connector, Credentials, Endpoint, RemoteConnection};
pub use ftps::FtpsConnector;
pub use memory::{MemoryConnector, StoredFile};
pub use session::{SessionSettings, SessionState, TransferSession, CONNECT_TIMEOUT};
pub use uploader::{push, remote_join, upload, UploadOutcome};
