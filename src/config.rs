use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/media-frame/config.yaml";
pub const CONFIG_ENV_VAR: &str = "MEDIA_FRAME_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Directory holding every uploaded image and video.
    pub media_dir: PathBuf,
    /// Slot directory holding zero or one active playlist descriptor.
    pub active_playlist_dir: PathBuf,
    /// Directory holding the descriptors that are not currently active.
    pub inactive_playlist_dir: PathBuf,
    /// File whose first line is the address the upload page is reachable at.
    pub address_file: PathBuf,
    /// Port appended to the displayed address.
    pub address_port: u16,
    /// Seconds an image stays on screen when the frame starts.
    pub dwell_seconds: u32,
    /// Maximum number of concurrent decodes while building a playlist.
    pub loader_max_concurrent_decodes: usize,
    pub video: VideoOptions,
    pub buttons: ButtonConfig,
    pub window: WindowConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Load from `MEDIA_FRAME_CONFIG` (or the default path). A missing file
    /// yields the built-in defaults.
    pub fn load() -> Result<(Self, PathBuf)> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            return Ok((Self::default(), path));
        }
        let cfg = Self::from_yaml_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        Ok((cfg, path))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(self.dwell_seconds > 0, "dwell-seconds must be greater than zero");
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            !self.media_dir.as_os_str().is_empty(),
            "media-dir must not be empty"
        );
        ensure!(
            self.active_playlist_dir != self.inactive_playlist_dir,
            "active-playlist-dir and inactive-playlist-dir must differ"
        );
        self.buttons
            .validate()
            .context("invalid buttons configuration")?;
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let root = PathBuf::from("/home/pi/PiFrameFinal");
        let backend = root.join("backend");
        Self {
            media_dir: backend.join("uploadedMedia"),
            active_playlist_dir: backend.join("playlists").join("active"),
            inactive_playlist_dir: backend.join("playlists").join("inactive"),
            address_file: root.join("ip.txt"),
            address_port: 3000,
            dwell_seconds: 3,
            loader_max_concurrent_decodes: 2,
            video: VideoOptions::default(),
            buttons: ButtonConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VideoOptions {
    /// Program used to read duration, frame rate and size.
    pub ffprobe: PathBuf,
    /// Program used to stream scaled RGBA frames.
    pub ffmpeg: PathBuf,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// Evdev wiring for the four hardware buttons. The action bound to each
/// line is fixed; only the key codes the lines report are configurable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ButtonConfig {
    pub enabled: bool,
    /// Input device path. Auto-detected when omitted.
    pub device: Option<PathBuf>,
    pub debounce_ms: u64,
    pub pause_key: String,
    pub menu_key: String,
    pub dwell_key: String,
    pub quit_key: String,
}

impl ButtonConfig {
    pub fn keys(&self) -> [&str; 4] {
        [
            self.pause_key.as_str(),
            self.menu_key.as_str(),
            self.dwell_key.as_str(),
            self.quit_key.as_str(),
        ]
    }

    fn validate(&self) -> Result<()> {
        let keys = self.keys();
        for (idx, key) in keys.iter().enumerate() {
            ensure!(!key.trim().is_empty(), "button key codes must not be empty");
            ensure!(
                !keys[idx + 1..].contains(key),
                "button key {key} is bound more than once"
            );
        }
        Ok(())
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: None,
            debounce_ms: 200,
            pause_key: "KEY_F1".to_string(),
            menu_key: "KEY_F2".to_string(),
            dwell_key: "KEY_F3".to_string(),
            quit_key: "KEY_F4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WindowConfig {
    pub title: String,
    /// Borderless fullscreen on the panel; windowed 320x240 otherwise.
    pub fullscreen: bool,
    pub hide_cursor: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Media Frame".to_string(),
            fullscreen: true,
            hide_cursor: true,
        }
    }
}
