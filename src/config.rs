//! User configuration, read once at startup from
//! `<config dir>/sonicwave/config.toml`. Missing or malformed files fall
//! back to defaults so the app always starts.

use crate::tui::ViewMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial output gain, linear 0..1.
    pub volume: f32,
    /// Visualization shown at startup.
    pub view: ViewMode,
    /// Seconds moved per seek keypress.
    pub seek_step_secs: f64,
    /// Where finalized recordings land. Defaults to the platform audio
    /// directory, falling back to the current directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordings_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            volume: 0.8,
            view: ViewMode::Waveform,
            seek_step_secs: 5.0,
            recordings_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(%err, path = %path.display(), "ignoring malformed config");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sonicwave").join("config.toml"))
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .or_else(dirs::audio_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
