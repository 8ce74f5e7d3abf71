//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::core::Bitrate;

#[derive(Parser, Debug)]
#[command(name = "opus2mp3")]
#[command(about = "Convert OPUS/OGG/WebM audio to MP3, entirely on this machine")]
#[command(version)]
pub struct Args {
    /// Input audio file (.opus, .ogg or .webm)
    pub input: PathBuf,

    /// Target MP3 bitrate (128k, 192k or 320k)
    #[arg(short, long, default_value_t = Bitrate::default())]
    pub bitrate: Bitrate,

    /// Output path (defaults to the input name with an .mp3 extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite the output file if it already exists
    #[arg(short, long)]
    pub force: bool,

    /// Use an existing engine binary instead of downloading one
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Resolved output path
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("mp3"))
    }
}
