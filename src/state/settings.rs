/// Persisted viewer settings
///
/// Stored as JSON in the user's config directory:
/// - Linux: ~/.config/filter-viewer/settings.json
/// - macOS: ~/Library/Application Support/filter-viewer/settings.json
/// - Windows: %APPDATA%\filter-viewer\settings.json

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::filter::FilterSelector;
use crate::error::Result;

/// Which `RenderTarget` the viewer drives
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackend {
    /// wgpu, falling back to software when no adapter is found
    #[default]
    Gpu,
    Software,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ViewerSettings {
    pub backend: RenderBackend,
    /// Filter selection of the previous session
    pub session: FilterSelector,
    /// Directory of the last opened or saved image
    pub last_directory: Option<PathBuf>,
}

impl ViewerSettings {
    /// Default location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("filter-viewer");
        path.push("settings.json");
        Some(path)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from_or_default(&path),
            None => {
                warn!("no config directory available, using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing or unreadable file yields defaults
    pub fn load_from_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file yet");
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    /// Load from `path`; out-of-domain filter values are clamped
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&json)?;
        settings.session.normalize();
        Ok(settings)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => {
                warn!("no config directory available, settings not saved");
                Ok(())
            }
        }
    }

    /// Save to `path`, creating its parent directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}
