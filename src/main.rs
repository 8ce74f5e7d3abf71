//! opus2mp3 - local OPUS/OGG/WebM to MP3 converter
//!
//! Converts a single audio file to MP3 on this machine. The transcoding
//! engine is a managed ffmpeg binary, fetched from a list of download
//! mirrors on first use and cached for later runs.

mod audio;
mod cli;
mod conversion;
mod core;
mod engine;
mod error;
mod logging;
mod settings;

use std::io::{IsTerminal, Write};

use clap::Parser;

use crate::audio::{format_duration, probe_source};
use crate::cli::Args;
use crate::conversion::ConversionSession;
use crate::core::validation::{format_file_size, is_supported_input, is_within_size_limit};
use crate::engine::{EngineConfig, FfmpegEngine};
use crate::error::{Error, Result};
use crate::settings::Settings;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    match run(args).await {
        Ok(()) => {}
        Err(err) => {
            log::error!("{}", err);
            let code = if err.is_validation() { 2 } else { 1 };
            std::process::exit(code);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let input = &args.input;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Selection-time validation, before any engine interaction
    if !is_supported_input(&file_name) {
        return Err(Error::UnsupportedInput { name: file_name });
    }
    let size = tokio::fs::metadata(input).await?.len();
    if !is_within_size_limit(size) {
        return Err(Error::InputTooLarge { size });
    }

    let output_path = args.output_path();
    if output_path.exists() && !args.force {
        return Err(Error::OutputExists { path: output_path });
    }

    log::info!("Input: {} ({})", input.display(), format_file_size(size));
    match probe_source(input) {
        Ok(info) => {
            let duration = if info.duration_secs > 0.0 {
                format_duration(info.duration_secs)
            } else {
                "unknown length".to_string()
            };
            log::info!("Source: {} audio, {}, ~{} kbps", info.codec, duration, info.bitrate_kbps);
        }
        Err(err) => log::warn!("{}", err),
    }

    let settings = Settings::load();
    let engine = FfmpegEngine::new(EngineConfig {
        binary_override: args.engine.clone().or_else(|| settings.engine_path.clone()),
        mirrors: settings.mirrors.clone(),
        cache_dir: settings.effective_cache_dir(),
    });

    let mut session = ConversionSession::new(Box::new(engine));
    session.set_loading_callback(Box::new(|active, message| {
        if active {
            eprintln!("{message}");
        }
    }));

    // Live single-line progress readout; skipped when stderr is piped
    let render_progress = std::io::stderr().is_terminal();
    session.set_progress_callback(Box::new(move |percent| {
        if render_progress {
            eprint!("\rConverting... {percent:>3}%");
            let _ = std::io::stderr().flush();
        }
    }));

    log::info!("Converting to MP3 at {}", args.bitrate.describe());
    let result = session.convert(input, args.bitrate).await;
    if render_progress {
        eprintln!();
    }
    let output = result?;

    tokio::fs::write(&output_path, &output).await?;
    log::info!(
        "Wrote {} ({})",
        output_path.display(),
        format_file_size(output.len() as u64)
    );

    session.terminate();
    Ok(())
}
