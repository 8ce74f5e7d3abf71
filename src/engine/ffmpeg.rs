//! FFmpeg subprocess engine
//!
//! Production implementation of [`TranscodeEngine`]: a managed ffmpeg binary
//! driven as a subprocess against a private staging directory that plays the
//! role of the engine's virtual filesystem. Progress is parsed from the
//! machine-readable `-progress` stream, scaled against the input duration
//! reported on stderr, and forwarded as fractional events.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::fetch::{HttpFetcher, ResourceFetcher};
use super::provision::{provision_engine, verify_engine_binary, EngineMirror};
use super::{LogHandler, ProgressHandler, TranscodeEngine};
use crate::error::{Error, Result};

/// Diagnostic lines kept for error reporting on a failed exec
const DIAGNOSTIC_TAIL_LINES: usize = 30;

/// Configuration for building an [`FfmpegEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Use this binary instead of provisioning one
    pub binary_override: Option<PathBuf>,
    /// Download mirrors, in priority order
    pub mirrors: Vec<EngineMirror>,
    /// Directory the provisioned binary is cached in
    pub cache_dir: PathBuf,
}

/// Subprocess-backed transcoding engine.
pub struct FfmpegEngine {
    config: EngineConfig,
    fetcher: Box<dyn ResourceFetcher>,
    binary: Option<PathBuf>,
    staging: Option<TempDir>,
    progress_handler: Option<ProgressHandler>,
    log_handler: Option<LogHandler>,
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_fetcher(config, Box::new(HttpFetcher::new()))
    }

    /// Build with a custom resource fetcher (used by tests)
    pub fn with_fetcher(config: EngineConfig, fetcher: Box<dyn ResourceFetcher>) -> Self {
        Self {
            config,
            fetcher,
            binary: None,
            staging: None,
            progress_handler: None,
            log_handler: None,
        }
    }

    fn staging_path(&self, name: &str) -> Result<PathBuf> {
        let staging = self.staging.as_ref().ok_or(Error::EngineNotLoaded)?;
        check_virtual_name(name)?;
        Ok(staging.path().join(name))
    }

    fn emit_progress(&self, fraction: f32) {
        if let Some(handler) = &self.progress_handler {
            handler(fraction.clamp(0.0, 1.0));
        }
    }

    fn emit_log(&self, line: &str) {
        if let Some(handler) = &self.log_handler {
            handler(line);
        }
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn load(&mut self) -> Result<()> {
        if self.binary.is_none() {
            let binary = match &self.config.binary_override {
                Some(path) => {
                    verify_engine_binary(path)?;
                    path.clone()
                }
                None => {
                    provision_engine(
                        self.fetcher.as_ref(),
                        &self.config.mirrors,
                        &self.config.cache_dir,
                    )
                    .await?
                }
            };
            log::debug!("Engine binary: {}", binary.display());
            self.binary = Some(binary);
        }

        if self.staging.is_none() {
            let staging = tempfile::Builder::new().prefix("opus2mp3-").tempdir()?;
            log::debug!("Engine staging directory: {}", staging.path().display());
            self.staging = Some(staging);
        }

        Ok(())
    }

    fn set_progress_handler(&mut self, handler: ProgressHandler) {
        self.progress_handler = Some(handler);
    }

    fn set_log_handler(&mut self, handler: LogHandler) {
        self.log_handler = Some(handler);
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.staging_path(name)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<()> {
        let binary = self.binary.as_ref().ok_or(Error::EngineNotLoaded)?;
        let staging = self.staging.as_ref().ok_or(Error::EngineNotLoaded)?;

        let mut cmd = Command::new(binary);
        cmd.current_dir(staging.path())
            // Plumbing flags: no prompts, no tty stats, progress on stdout
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-y")
            .arg("-nostats")
            .arg("-progress")
            .arg("pipe:1")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("Engine exec: {}", args.join(" "));

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Io(std::io::Error::other("engine stdout was not captured"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            Error::Io(std::io::Error::other("engine stderr was not captured"))
        })?;

        // Input duration arrives on stderr; progress timestamps on stdout.
        let duration_secs: Mutex<Option<f64>> = Mutex::new(None);
        let diagnostic_tail: Mutex<Vec<String>> = Mutex::new(Vec::new());

        let progress_stream = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(out_time_us) = parse_out_time_us(&line) {
                    let total = *duration_secs.lock().unwrap();
                    if let Some(total) = total.filter(|t| *t > 0.0) {
                        let fraction = (out_time_us as f64 / (total * 1_000_000.0)) as f32;
                        self.emit_progress(fraction);
                    }
                }
            }
            Ok::<(), Error>(())
        };

        let diagnostic_stream = async {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(secs) = parse_duration_line(&line) {
                    duration_secs.lock().unwrap().get_or_insert(secs);
                }
                self.emit_log(&line);
                let mut tail = diagnostic_tail.lock().unwrap();
                if tail.len() == DIAGNOSTIC_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            Ok::<(), Error>(())
        };

        let (progress_result, diagnostic_result) = tokio::join!(progress_stream, diagnostic_stream);
        progress_result?;
        diagnostic_result?;

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            let tail = diagnostic_tail.lock().unwrap();
            let detail = tail
                .iter()
                .rev()
                .find(|line| !line.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| "unknown error".to_string());
            Err(Error::EngineExec {
                status: status.to_string(),
                detail,
            })
        }
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.staging_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.staging_path(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    fn terminate(&mut self) {
        // Dropping the TempDir removes the staging directory and everything
        // in it. The cached binary is kept for the next load.
        if self.staging.take().is_some() {
            log::debug!("Engine terminated, staging directory released");
        }
    }
}

/// Virtual file names must be bare names: no separators, no parent refs
fn check_virtual_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidVirtualName {
            name: name.to_string(),
        })
    }
}

/// Parse `out_time_us=<micros>` from the `-progress` stream
fn parse_out_time_us(line: &str) -> Option<u64> {
    line.strip_prefix("out_time_us=")?.trim().parse().ok()
}

/// Parse the input duration from ffmpeg's stderr header, e.g.
/// `  Duration: 00:03:21.45, start: 0.000000, bitrate: 96 kb/s`
fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration: ")?;
    let stamp = rest.split(',').next()?.trim();
    if stamp == "N/A" {
        return None;
    }

    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_engine() -> (FfmpegEngine, TempDir) {
        // A dummy executable stands in for the real binary; these tests only
        // exercise the virtual filesystem, never exec.
        let cache = tempfile::tempdir().unwrap();
        let binary = cache.path().join("ffmpeg");
        std::fs::write(&binary, b"#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let engine = FfmpegEngine::new(EngineConfig {
            binary_override: Some(binary),
            mirrors: vec![],
            cache_dir: cache.path().to_path_buf(),
        });
        (engine, cache)
    }

    #[test]
    fn test_check_virtual_name() {
        assert!(check_virtual_name("input.opus").is_ok());
        assert!(check_virtual_name("output.mp3").is_ok());
        assert!(check_virtual_name("input").is_ok());
        assert!(check_virtual_name("").is_err());
        assert!(check_virtual_name("..").is_err());
        assert!(check_virtual_name("a/b.opus").is_err());
        assert!(check_virtual_name("a\\b.opus").is_err());
    }

    #[test]
    fn test_parse_out_time_us() {
        assert_eq!(parse_out_time_us("out_time_us=1500000"), Some(1_500_000));
        assert_eq!(parse_out_time_us("out_time_us=0"), Some(0));
        assert_eq!(parse_out_time_us("frame=12"), None);
        assert_eq!(parse_out_time_us("out_time_us=N/A"), None);
    }

    #[test]
    fn test_parse_duration_line() {
        assert_eq!(
            parse_duration_line("  Duration: 00:03:21.45, start: 0.000000, bitrate: 96 kb/s"),
            Some(201.45)
        );
        assert_eq!(
            parse_duration_line("Duration: 01:00:00.00, bitrate: 128 kb/s"),
            Some(3600.0)
        );
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream #0:0: Audio: opus"), None);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let (mut engine, _cache) = loaded_engine();
        engine.load().await.unwrap();
        let staging_before = engine.staging.as_ref().unwrap().path().to_path_buf();

        engine.load().await.unwrap();
        let staging_after = engine.staging.as_ref().unwrap().path().to_path_buf();
        assert_eq!(staging_before, staging_after);
    }

    #[tokio::test]
    async fn test_virtual_file_round_trip() {
        let (mut engine, _cache) = loaded_engine();
        engine.load().await.unwrap();

        engine.write_file("input.opus", b"payload").await.unwrap();
        assert_eq!(engine.read_file("input.opus").await.unwrap(), b"payload");

        engine.delete_file("input.opus").await.unwrap();
        assert!(engine.read_file("input.opus").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_an_error() {
        let (mut engine, _cache) = loaded_engine();
        engine.load().await.unwrap();
        assert!(engine.delete_file("output.mp3").await.is_err());
    }

    #[tokio::test]
    async fn test_operations_require_load() {
        let (engine, _cache) = loaded_engine();
        let err = engine.write_file("input.opus", b"x").await.unwrap_err();
        assert!(matches!(err, Error::EngineNotLoaded));
    }

    #[tokio::test]
    async fn test_terminate_releases_staging_and_reload_recreates_it() {
        let (mut engine, _cache) = loaded_engine();
        engine.load().await.unwrap();
        engine.write_file("input.opus", b"payload").await.unwrap();
        let staging = engine.staging.as_ref().unwrap().path().to_path_buf();

        engine.terminate();
        engine.terminate(); // safe to call repeatedly
        assert!(!staging.exists());
        assert!(matches!(
            engine.read_file("input.opus").await.unwrap_err(),
            Error::EngineNotLoaded
        ));

        engine.load().await.unwrap();
        assert!(engine.read_file("input.opus").await.is_err());
        engine.write_file("input.opus", b"fresh").await.unwrap();
        assert_eq!(engine.read_file("input.opus").await.unwrap(), b"fresh");
    }
}
