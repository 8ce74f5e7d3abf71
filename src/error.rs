//! Error types for opus2mp3.

use std::path::PathBuf;

use crate::core::validation::{format_file_size, MAX_INPUT_BYTES};

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed attempt against one download mirror.
#[derive(Debug, Clone)]
pub struct MirrorFailure {
    pub mirror: String,
    pub reason: String,
}

pub(crate) fn describe_mirror_failures(attempts: &[MirrorFailure]) -> String {
    if attempts.is_empty() {
        return "no mirrors configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.mirror, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while loading the engine or converting a file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Every configured mirror failed to supply the engine binary.
    #[error("failed to load conversion engine: {}", describe_mirror_failures(attempts))]
    EngineLoad { attempts: Vec<MirrorFailure> },

    /// A conversion attempt failed inside the engine.
    #[error("conversion failed: {message}")]
    Conversion { message: String },

    /// An engine operation was issued before `load` succeeded.
    #[error("engine not loaded")]
    EngineNotLoaded,

    /// The engine process exited with a nonzero status.
    #[error("engine exited with {status}: {detail}")]
    EngineExec { status: String, detail: String },

    /// Virtual file names must be bare names, no path components.
    #[error("invalid virtual file name: {name}")]
    InvalidVirtualName { name: String },

    /// No engine build is published for this platform.
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The downloaded payload did not match the mirror's checksum.
    #[error("checksum mismatch from {mirror}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        mirror: String,
        expected: String,
        actual: String,
    },

    /// The mirror's checksum sidecar could not be parsed.
    #[error("malformed checksum file from {mirror}")]
    MalformedChecksum { mirror: String },

    /// The selected file does not have a supported extension.
    #[error("unsupported file format: {name} (expected .opus, .ogg or .webm)")]
    UnsupportedInput { name: String },

    /// The selected file exceeds the size limit.
    #[error("file too large: {} (limit is {})", format_file_size(*size), format_file_size(MAX_INPUT_BYTES))]
    InputTooLarge { size: u64 },

    /// The output path already exists.
    #[error("output already exists: {} (use --force to overwrite)", path.display())]
    OutputExists { path: PathBuf },

    /// A bitrate string outside the allowed set.
    #[error("unsupported bitrate: {0} (expected 128k, 192k or 320k)")]
    InvalidBitrate(String),

    /// The source file could not be probed.
    #[error("failed to probe source: {0}")]
    Probe(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transfer error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Wrap an underlying engine failure as a conversion error.
    pub fn conversion(err: impl std::fmt::Display) -> Self {
        Self::Conversion {
            message: err.to_string(),
        }
    }

    /// True for errors that are reported at selection time, before any
    /// engine interaction.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedInput { .. } | Error::InputTooLarge { .. } | Error::OutputExists { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_load_message_lists_every_mirror() {
        let err = Error::EngineLoad {
            attempts: vec![
                MirrorFailure {
                    mirror: "primary".to_string(),
                    reason: "HTTP 503".to_string(),
                },
                MirrorFailure {
                    mirror: "fallback".to_string(),
                    reason: "timed out".to_string(),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.contains("primary: HTTP 503"));
        assert!(message.contains("fallback: timed out"));
    }

    #[test]
    fn test_engine_load_message_without_mirrors() {
        let err = Error::EngineLoad { attempts: vec![] };
        assert!(err.to_string().contains("no mirrors configured"));
    }

    #[test]
    fn test_conversion_wraps_underlying_message() {
        let err = Error::conversion("engine exited with exit status: 1");
        assert_eq!(
            err.to_string(),
            "conversion failed: engine exited with exit status: 1"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(Error::UnsupportedInput {
            name: "a.mp3".to_string()
        }
        .is_validation());
        assert!(Error::InputTooLarge { size: 1 }.is_validation());
        assert!(!Error::EngineNotLoaded.is_validation());
    }
}
