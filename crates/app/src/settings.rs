//! Persisted user settings. Only the last-used frame rate survives restarts.

use std::io::{self, Read};
use std::path::PathBuf;
use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SETTINGS_FILE: &str = "mirrorpane.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub fps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self { fps: 30 }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open settings file: {0}")]
    OpenFile(#[source] io::Error),

    #[error("failed to read settings file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to save settings file: {0}")]
    SaveFile(#[from] SaveError),

    #[error("failed to deserialize settings: {0}")]
    Deserialize(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write settings file: {0}")]
    Write(#[from] io::Error),
}

impl Settings {
    pub fn load_or_create() -> Result<Self, LoadError> {
        let file = fs::File::open(Self::file_path());

        if file.as_ref().is_err_and(|e| e.kind() == io::ErrorKind::NotFound) {
            let settings = Self::default();
            settings.save()?;
            return Ok(settings);
        }

        let mut file = file.map_err(LoadError::OpenFile)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(LoadError::ReadFile)?;

        let mut settings: Settings = toml::from_str(&contents)?;
        if settings.fps == 0 {
            settings.fps = Self::default().fps;
        }
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), SaveError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(Self::file_path(), toml_string.as_bytes())?;
        Ok(())
    }

    fn file_path() -> PathBuf {
        // Next to the executable when resolvable, the working directory
        // otherwise.
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SETTINGS_FILE)))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }
}
