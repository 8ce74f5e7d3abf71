//! Audio conversion module
//!
//! Handles transcoding a single audio file to MP3 through the external
//! engine, with lazy engine loading and progress reporting.

mod session;

pub use session::{ConversionSession, LoadingCallback, ProgressCallback};
