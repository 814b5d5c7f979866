use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::PlaybackSource;

const CONFIG_FILE: &str = "spotify-window.json";
const DEFAULT_INNERTUBE_URL: &str = "https://www.youtube.com";
pub const INNERTUBE_URL_ENV: &str = "SPOTIFY_WINDOW_INNERTUBE_URL";

// ============================================================================
// Window sizing
// ============================================================================

/// Sizes of the playback window
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Tracks queued when a session starts
    pub initial_tracks: usize,
    /// Tracks added each time playback nears an edge
    pub tracks_per_request: usize,
    /// How close to an edge playback gets before more tracks load
    pub buffer_from_load: usize,
    /// Time a muxed stream download gets before the user is asked
    pub stream_timeout_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            initial_tracks: 3,
            tracks_per_request: 2,
            buffer_from_load: 2,
            stream_timeout_ms: 5000,
        }
    }
}

impl WindowConfig {
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: PlaybackSource,
    pub shuffle: bool,
    pub repeat: bool,
    pub window: WindowConfig,
    pub innertube_url: String,
    pub market: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: PlaybackSource::default(),
            shuffle: false,
            repeat: false,
            window: WindowConfig::default(),
            innertube_url: DEFAULT_INNERTUBE_URL.to_string(),
            market: None,
        }
    }
}

impl Settings {
    /// Load from the user config directory, writing defaults on first run
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::path()?)?;
        if let Ok(url) = std::env::var(INNERTUBE_URL_ENV) {
            if !url.is_empty() {
                tracing::debug!(url, "Video index url overridden from environment");
                settings.innertube_url = url;
            }
        }
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                let settings: Settings = serde_json::from_str(&data)
                    .with_context(|| format!("invalid settings in {}", path.display()))?;
                tracing::info!(path = %path.display(), "Loaded settings");
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Settings::default();
                settings.save_to(path)?;
                tracing::info!(path = %path.display(), "Created default settings");
                Ok(settings)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Store the repeat mode so the next run starts with it
    pub fn remember_repeat(&mut self, enabled: bool) -> Result<()> {
        self.remember_repeat_at(enabled, &Self::path()?)
    }

    /// Only `repeat` is written back; command-line overrides held in `self` stay out of the file
    pub fn remember_repeat_at(&mut self, enabled: bool, path: &Path) -> Result<()> {
        self.repeat = enabled;
        let mut stored = Self::load_from(path)?;
        stored.repeat = enabled;
        stored.save_to(path)
    }

    /// Write to a temp file and rename over the target
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("spotify-window-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join(CONFIG_FILE)
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = scratch_path("defaults");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(settings.window.stream_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn saved_settings_load_back() {
        let path = scratch_path("roundtrip");
        let settings = Settings {
            source: PlaybackSource::YouTube,
            shuffle: true,
            market: Some("SE".into()),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn repeat_toggle_survives_a_reload() {
        let path = scratch_path("repeat");
        let mut settings = Settings::load_from(&path).unwrap();
        assert!(!settings.repeat);
        settings.source = PlaybackSource::YouTube;

        settings.remember_repeat_at(true, &path).unwrap();
        assert!(settings.repeat);
        let stored = Settings::load_from(&path).unwrap();
        assert!(stored.repeat);
        assert_eq!(stored.source, PlaybackSource::Spotify);

        settings.remember_repeat_at(false, &path).unwrap();
        assert!(!Settings::load_from(&path).unwrap().repeat);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"source":"youtube","window":{"tracks_per_request":4}}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.source, PlaybackSource::YouTube);
        assert_eq!(settings.window.tracks_per_request, 4);
        assert_eq!(settings.window.initial_tracks, 3);
        assert_eq!(settings.innertube_url, DEFAULT_INNERTUBE_URL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = scratch_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
