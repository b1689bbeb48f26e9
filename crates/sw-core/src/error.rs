//! Unified error type for the stillwire pipeline.
//!
//! All library crates funnel their failures into [`Error`]. Whether a failure
//! stops the run is decided by the caller: configuration and connection
//! errors are fatal, everything raised inside a stage is logged and skipped.

/// Unified error type covering all failure modes in stillwire.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration file could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Every connection attempt to the remote endpoint failed.
    #[error("failed to establish connection after {attempts} attempts: {message}")]
    Connection {
        /// Number of attempts that were made.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    /// A single transport operation (connect, login, store, close) failed.
    #[error("Transfer error [{target}]: {message}")]
    Transfer {
        /// Remote path or endpoint the operation targeted.
        target: String,
        /// Human-readable error description.
        message: String,
    },

    /// The manifest could not be written or read back.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transfer`].
    pub fn transfer(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transfer {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
