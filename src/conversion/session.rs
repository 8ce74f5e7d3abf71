//! Conversion session
//!
//! Owns one instance of the transcoding engine and sequences it through
//! load, write, exec, read and cleanup for a single file. Loading is lazy:
//! the first conversion pulls the engine in, later ones reuse it. Progress
//! and loading state are surfaced through single-subscriber callback slots.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::core::Bitrate;
use crate::engine::TranscodeEngine;
use crate::error::{Error, Result};

/// Receives integer progress updates (0 to 100).
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Receives loading-state changes: active flag plus a display message.
pub type LoadingCallback = Box<dyn Fn(bool, &str) + Send + Sync>;

/// Fixed virtual output name; the input name is derived per conversion.
const OUTPUT_NAME: &str = "output.mp3";

const LOADING_MESSAGE: &str = "Initializing conversion engine...";

/// Sequences the external transcoding engine for one conversion at a time.
///
/// At most one conversion may be in flight per session: the engine's virtual
/// filesystem uses fixed input/output names, and both entries are removed
/// after every attempt so a later call never sees stale files.
pub struct ConversionSession {
    engine: Box<dyn TranscodeEngine>,
    loaded: bool,
    progress: Arc<Mutex<Option<ProgressCallback>>>,
    loading: Mutex<Option<LoadingCallback>>,
}

impl ConversionSession {
    pub fn new(mut engine: Box<dyn TranscodeEngine>) -> Self {
        let progress: Arc<Mutex<Option<ProgressCallback>>> = Arc::new(Mutex::new(None));

        // Forward fractional engine events to the registered callback as
        // rounded percentages. 100 is reserved for a completed conversion,
        // reported after the output has actually been read back.
        let slot = Arc::clone(&progress);
        engine.set_progress_handler(Box::new(move |fraction| {
            let percent = (f64::from(fraction) * 100.0).round().clamp(0.0, 100.0) as u8;
            let percent = percent.min(99);
            if let Some(callback) = slot.lock().unwrap().as_ref() {
                callback(percent);
            }
        }));
        engine.set_log_handler(Box::new(|line| log::debug!("[engine] {}", line)));

        Self {
            engine,
            loaded: false,
            progress,
            loading: Mutex::new(None),
        }
    }

    /// Register the progress observer. Replacing a previous one overwrites it.
    pub fn set_progress_callback(&self, callback: ProgressCallback) {
        *self.progress.lock().unwrap() = Some(callback);
    }

    /// Register the loading observer. Replacing a previous one overwrites it.
    pub fn set_loading_callback(&self, callback: LoadingCallback) {
        *self.loading.lock().unwrap() = Some(callback);
    }

    /// Load the engine if it is not loaded yet. Idempotent.
    pub async fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        self.report_loading(true, LOADING_MESSAGE);
        let result = self.engine.load().await;
        self.report_loading(false, "");
        result?;

        self.loaded = true;
        Ok(())
    }

    /// Convert a source file to MP3 at the given bitrate, returning the
    /// encoded bytes.
    ///
    /// Loads the engine first if needed. Every failure after the virtual
    /// input was written still runs cleanup: the input entry is always
    /// removed, the output entry whenever the engine produced one. A cleanup
    /// failure is logged and never masks the primary error.
    pub async fn convert(&mut self, source: &Path, bitrate: Bitrate) -> Result<Vec<u8>> {
        self.ensure_loaded().await?;
        self.report_progress(0);

        let input_name = format!("input{}", lowercase_extension(source));
        let data = tokio::fs::read(source).await.map_err(Error::conversion)?;

        self.engine
            .write_file(&input_name, &data)
            .await
            .map_err(Error::conversion)?;

        let args: Vec<String> = vec![
            "-i".to_string(),
            input_name.clone(),
            "-b:a".to_string(),
            bitrate.as_arg().to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            OUTPUT_NAME.to_string(),
        ];

        let exec_result = self.engine.exec(&args).await;
        let output_produced = exec_result.is_ok();
        let read_result = match exec_result {
            Ok(()) => self.engine.read_file(OUTPUT_NAME).await,
            Err(err) => Err(err),
        };

        // Cleanup runs on every attempt, success or failure.
        if let Err(err) = self.engine.delete_file(&input_name).await {
            log::warn!("Cleanup: failed to delete {}: {}", input_name, err);
        }
        if output_produced {
            if let Err(err) = self.engine.delete_file(OUTPUT_NAME).await {
                log::warn!("Cleanup: failed to delete {}: {}", OUTPUT_NAME, err);
            }
        }

        let output = read_result.map_err(Error::conversion)?;
        self.report_progress(100);
        Ok(output)
    }

    /// Release the engine instance. Safe to call repeatedly; the next
    /// conversion re-initializes it.
    pub fn terminate(&mut self) {
        self.engine.terminate();
        self.loaded = false;
    }

    fn report_progress(&self, percent: u8) {
        if let Some(callback) = self.progress.lock().unwrap().as_ref() {
            callback(percent);
        }
    }

    fn report_loading(&self, active: bool, message: &str) {
        if let Some(callback) = self.loading.lock().unwrap().as_ref() {
            callback(active, message);
        }
    }
}

/// Lowercase extension of a path including the dot, or empty if none
fn lowercase_extension(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => String::new(),
    }
}
