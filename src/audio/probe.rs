//! Source file probing
//!
//! Reads the container headers of the selected file to show the user what
//! is about to be converted. Probing is informational only: a file the
//! prober cannot read may still be accepted by the engine.

use std::fs::{self, File};
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// What could be determined about a source file
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Duration in seconds, 0.0 when the container does not report one
    pub duration_secs: f64,
    /// Average bitrate in kbps derived from file size and duration
    pub bitrate_kbps: u32,
    /// Codec name, e.g. "opus" or "vorbis"
    pub codec: String,
}

/// Probe a source file's duration, bitrate and codec
pub fn probe_source(path: &Path) -> Result<SourceInfo> {
    let file = File::open(path).map_err(|e| Error::Probe(format!("failed to open file: {e}")))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| Error::Probe(format!("unrecognized audio format: {e}")))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::Probe("no audio track found".to_string()))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(48_000) as f64;
    let n_frames = track.codec_params.n_frames.unwrap_or(0);
    let duration_secs = n_frames as f64 / sample_rate;

    // Average bitrate from file size, the container rarely reports one
    let file_size = fs::metadata(path)
        .map_err(|e| Error::Probe(format!("failed to stat file: {e}")))?
        .len();
    let bitrate_kbps = if duration_secs > 0.0 {
        ((file_size * 8) as f64 / duration_secs / 1000.0) as u32
    } else {
        0
    };

    // Symphonia exposes the codec as an opaque id; match on its debug name
    // and fall back to the file extension.
    let codec_str = format!("{:?}", track.codec_params.codec);
    let codec = if codec_str.contains("Opus") {
        "opus".to_string()
    } else if codec_str.contains("Vorbis") {
        "vorbis".to_string()
    } else if codec_str.contains("Flac") || codec_str.contains("FLAC") {
        "flac".to_string()
    } else if codec_str.contains("Pcm") || codec_str.contains("PCM") {
        "pcm".to_string()
    } else {
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_lowercase()
    };

    Ok(SourceInfo {
        duration_secs,
        bitrate_kbps,
        codec,
    })
}

/// Format a duration in seconds as m:ss for display
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
