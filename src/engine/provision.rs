//! Engine binary provisioning
//!
//! Downloads a static ffmpeg build from a prioritized list of mirrors into
//! the local cache directory. Mirrors are tried strictly in order and the
//! first verified success short-circuits the rest. Each mirror publishes a
//! raw binary per platform plus a SHA-256 sidecar; a payload that fails
//! verification counts as that mirror's failure.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::fetch::ResourceFetcher;
use crate::error::{Error, MirrorFailure, Result};

/// Release line of the static engine build the mirrors carry.
const ENGINE_RELEASE: &str = "b6.0";

/// A single download mirror for the engine build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMirror {
    /// Short name used in logs and error messages
    pub name: String,
    /// Base URL the per-platform assets hang off
    pub base_url: String,
}

impl EngineMirror {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }

    /// URL of the engine binary for the given asset name
    pub fn binary_url(&self, asset: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), asset)
    }

    /// URL of the SHA-256 sidecar for the given asset name
    pub fn checksum_url(&self, asset: &str) -> String {
        format!("{}.sha256", self.binary_url(asset))
    }
}

/// Default mirror list, in priority order.
pub fn default_mirrors() -> Vec<EngineMirror> {
    vec![
        EngineMirror::new(
            "github",
            format!("https://github.com/eugeneware/ffmpeg-static/releases/download/{ENGINE_RELEASE}"),
        ),
        EngineMirror::new(
            "npmmirror",
            format!("https://registry.npmmirror.com/-/binary/ffmpeg-static/{ENGINE_RELEASE}"),
        ),
    ]
}

/// Asset name of the engine build for the current platform
pub fn platform_asset() -> Result<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Ok("ffmpeg-linux-x64"),
        ("linux", "aarch64") => Ok("ffmpeg-linux-arm64"),
        ("macos", "x86_64") => Ok("ffmpeg-darwin-x64"),
        ("macos", "aarch64") => Ok("ffmpeg-darwin-arm64"),
        ("windows", "x86_64") => Ok("ffmpeg-win32-x64"),
        (os, arch) => Err(Error::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

/// File name the engine binary is installed under in the cache dir
fn install_name() -> &'static str {
    if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" }
}

/// Verify that an engine binary exists and is executable
pub fn verify_engine_binary(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("engine binary not found at {}", path.display()),
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("engine binary at {} is not executable", path.display()),
            )));
        }
    }

    Ok(())
}

/// Ensure the engine binary is present in the cache, downloading it from the
/// mirror list if necessary. Returns the path to the installed binary.
pub async fn provision_engine(
    fetcher: &dyn ResourceFetcher,
    mirrors: &[EngineMirror],
    cache_dir: &Path,
) -> Result<PathBuf> {
    let installed = cache_dir.join(install_name());
    if verify_engine_binary(&installed).is_ok() {
        log::debug!("Using cached engine binary at {}", installed.display());
        return Ok(installed);
    }

    let asset = platform_asset()?;
    let mut attempts: Vec<MirrorFailure> = Vec::new();

    for mirror in mirrors {
        log::info!("Fetching engine from mirror '{}'", mirror.name);
        match fetch_from_mirror(fetcher, mirror, asset).await {
            Ok(payload) => {
                install_binary(&installed, &payload).await?;
                log::info!(
                    "Engine installed from mirror '{}' at {}",
                    mirror.name,
                    installed.display()
                );
                return Ok(installed);
            }
            Err(err) => {
                log::warn!("Mirror '{}' failed: {}", mirror.name, err);
                attempts.push(MirrorFailure {
                    mirror: mirror.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Err(Error::EngineLoad { attempts })
}

/// Fetch and verify the engine payload from one mirror
async fn fetch_from_mirror(
    fetcher: &dyn ResourceFetcher,
    mirror: &EngineMirror,
    asset: &str,
) -> Result<Vec<u8>> {
    let expected = parse_checksum(&fetcher.fetch(&mirror.checksum_url(asset)).await?)
        .ok_or_else(|| Error::MalformedChecksum {
            mirror: mirror.name.clone(),
        })?;

    let payload = fetcher.fetch(&mirror.binary_url(asset)).await?;

    let actual = hex_digest(&payload);
    if actual != expected {
        return Err(Error::ChecksumMismatch {
            mirror: mirror.name.clone(),
            expected,
            actual,
        });
    }

    Ok(payload)
}

/// Extract the hex digest from a checksum sidecar ("<hex>" or "<hex>  <name>")
fn parse_checksum(sidecar: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(sidecar);
    let token = text.split_whitespace().next()?;
    if token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(token.to_lowercase())
    } else {
        None
    }
}

fn hex_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Write the verified payload into the cache and mark it executable.
/// Written to a partial name first so a crash never leaves a half-installed
/// binary under the final name.
async fn install_binary(installed: &Path, payload: &[u8]) -> Result<()> {
    if let Some(parent) = installed.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let partial = installed.with_extension("partial");
    tokio::fs::write(&partial, payload).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&partial).await?.permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&partial, perms).await?;
    }

    tokio::fs::rename(&partial, installed).await?;
    Ok(())
}
