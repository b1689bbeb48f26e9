//! # sw-av
//!
//! External media tooling for the stillwire pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg via config override
//!   or `PATH` and report its version.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Media collaborator** ([`MediaTool`], [`FfmpegTool`]) -- synthesize the
//!   test artifact and extract periodic captures from it.

pub mod command;
pub mod media;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use media::{
    ExtractionSpec, FfmpegTool, MediaTool, SynthesisSpec, CAPTURE_EXTENSION, CAPTURE_PREFIX,
};
pub use tools::{ToolInfo, ToolRegistry};
