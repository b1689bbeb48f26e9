//! sw-core: shared error type and configuration for the stillwire crates.
//!
//! Every other sw-* crate depends on this one for [`Error`], [`Result`] and
//! the [`config::Config`] record that is loaded once at startup and treated
//! as read-only for the rest of the run.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use config::Config;
pub use error::{Error, Result};
