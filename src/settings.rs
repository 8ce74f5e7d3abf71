//! User settings
//!
//! Optional JSON settings file under the per-user config directory. Missing
//! file means defaults; an unreadable file falls back to defaults with a
//! warning so a broken config never blocks a conversion. CLI flags override
//! whatever is loaded here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{default_mirrors, EngineMirror};

const SETTINGS_FILE: &str = "settings.json";

/// Persistent application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Use this engine binary instead of provisioning one
    pub engine_path: Option<PathBuf>,
    /// Engine download mirrors, in priority order
    pub mirrors: Vec<EngineMirror>,
    /// Where the provisioned engine binary is cached
    pub cache_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_path: None,
            mirrors: default_mirrors(),
            cache_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Settings {
        match settings_file_path() {
            Some(path) if path.exists() => Settings::load_from(&path),
            _ => Settings::default(),
        }
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Settings {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Could not read settings file {}: {}", path.display(), e);
                return Settings::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Could not parse settings file {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Cache directory to provision the engine into
    pub fn effective_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .map(|d| d.join("opus2mp3"))
            .unwrap_or_else(|| std::env::temp_dir().join("opus2mp3"))
    }
}

/// Path of the settings file, if a config directory exists
pub fn settings_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("opus2mp3").join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_mirrors() {
        let settings = Settings::default();
        assert!(!settings.mirrors.is_empty());
        assert!(settings.engine_path.is_none());
    }

    #[test]
    fn test_load_from_parses_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "engine_path": "/opt/ffmpeg/bin/ffmpeg",
                "mirrors": [{"name": "internal", "base_url": "https://mirror.internal/engine"}]
            }"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(
            settings.engine_path,
            Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(settings.mirrors.len(), 1);
        assert_eq!(settings.mirrors[0].name, "internal");
    }

    #[test]
    fn test_load_from_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"cache_dir": "/var/cache/opus2mp3"}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.cache_dir, Some(PathBuf::from("/var/cache/opus2mp3")));
        assert!(!settings.mirrors.is_empty());
    }

    #[test]
    fn test_load_from_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.engine_path.is_none());
        assert!(!settings.mirrors.is_empty());
    }

    #[test]
    fn test_effective_cache_dir_prefers_override() {
        let settings = Settings {
            cache_dir: Some(PathBuf::from("/tmp/engine-cache")),
            ..Settings::default()
        };
        assert_eq!(
            settings.effective_cache_dir(),
            PathBuf::from("/tmp/engine-cache")
        );
    }
}
