//! Input validation helpers
//!
//! Pure functions used at selection time, before the conversion session is
//! touched. Unsupported or oversized files never reach the engine.

/// Extensions the converter accepts as input.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".opus", ".ogg", ".webm"];

/// Maximum accepted input size (100 MiB).
pub const MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024;

/// Check whether a file name carries a supported input extension
pub fn is_supported_input(name: &str) -> bool {
    let name = name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Check a byte count against the input size limit
pub fn is_within_size_limit(bytes: u64) -> bool {
    bytes <= MAX_INPUT_BYTES
}

/// Format a byte count in human-readable form (Bytes, KB, MB, GB)
///
/// Uses binary (1024-based) units with two-decimal rounding, picking the
/// largest unit where the scaled value is at least 1.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }

    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent])
}
