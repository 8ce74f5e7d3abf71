//! Target bitrate selection
//!
//! The converter offers the same three MP3 targets as the original UI:
//! 128, 192 and 320 kbps, with 192 kbps as the default.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Allowed MP3 target bitrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bitrate {
    /// 128 kbps, smallest output
    Kbps128,
    /// 192 kbps, balanced default
    #[default]
    Kbps192,
    /// 320 kbps, maximum MP3 bitrate
    Kbps320,
}

impl Bitrate {
    /// All allowed targets, in ascending order
    pub const ALL: [Bitrate; 3] = [Bitrate::Kbps128, Bitrate::Kbps192, Bitrate::Kbps320];

    /// Numeric value in kbps
    pub fn kbps(&self) -> u32 {
        match self {
            Bitrate::Kbps128 => 128,
            Bitrate::Kbps192 => 192,
            Bitrate::Kbps320 => 320,
        }
    }

    /// Render as an ffmpeg `-b:a` argument (e.g. "192k")
    pub fn as_arg(&self) -> &'static str {
        match self {
            Bitrate::Kbps128 => "128k",
            Bitrate::Kbps192 => "192k",
            Bitrate::Kbps320 => "320k",
        }
    }

    /// Format for display (e.g. "192 kbps")
    pub fn describe(&self) -> String {
        format!("{} kbps", self.kbps())
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for Bitrate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "128" | "128k" => Ok(Bitrate::Kbps128),
            "192" | "192k" => Ok(Bitrate::Kbps192),
            "320" | "320k" => Ok(Bitrate::Kbps320),
            other => Err(Error::InvalidBitrate(other.to_string())),
        }
    }
}
