//! Transcoding engine abstraction
//!
//! The converter treats the transcoder as an opaque external engine with a
//! narrow command-style contract: load it, write a virtual input file, run an
//! FFmpeg-style argument vector, read the virtual output file, delete both.
//! The production implementation drives a managed ffmpeg binary; tests swap
//! in a recording double.

mod fetch;
mod ffmpeg;
mod provision;

pub use fetch::{HttpFetcher, ResourceFetcher};
pub use ffmpeg::{EngineConfig, FfmpegEngine};
pub use provision::{default_mirrors, platform_asset, provision_engine, EngineMirror};

use async_trait::async_trait;

use crate::error::Result;

/// Receives fractional progress events (0.0 to 1.0) during `exec`.
pub type ProgressHandler = Box<dyn Fn(f32) + Send + Sync>;

/// Receives diagnostic log lines emitted by the engine.
pub type LogHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Narrow command-style contract of the external transcoding engine.
///
/// `exec` applies the instructions written via `write_file` and produces a
/// new virtual file readable via `read_file`. Behavior for malformed
/// argument vectors is opaque and surfaces as an engine-level failure.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Acquire the engine's resources. Idempotent.
    async fn load(&mut self) -> Result<()>;

    /// Register the observer for fractional progress events. Replacing a
    /// previous observer overwrites it.
    fn set_progress_handler(&mut self, handler: ProgressHandler);

    /// Register the observer for engine log lines.
    fn set_log_handler(&mut self, handler: LogHandler);

    /// Write bytes into the engine's virtual filesystem under a bare name.
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Run an FFmpeg-style argument vector against the virtual filesystem.
    async fn exec(&self, args: &[String]) -> Result<()>;

    /// Read a virtual file produced by `exec`.
    async fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Remove a virtual file.
    async fn delete_file(&self, name: &str) -> Result<()>;

    /// Release the engine instance. Safe to call repeatedly; a later `load`
    /// re-initializes it.
    fn terminate(&mut self);
}
