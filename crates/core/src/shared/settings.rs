use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    DEFAULT_REFRESH_HZ, DEFAULT_SUMMARY_EVERY, SETTINGS_DIR_NAME, SETTINGS_FILE_NAME,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("refresh rate must be positive, got {0}")]
    RefreshRate(f64),
    #[error("confidence must be between 0.0 and 1.0, got {0}")]
    Confidence(f64),
}

/// What the loop does when the detector call itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorFailurePolicy {
    /// Log, mark the frame processed, and keep going.
    #[default]
    Skip,
    /// Stop the loop and report the error to the caller.
    Halt,
}

impl std::fmt::Display for DetectorFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorFailurePolicy::Skip => write!(f, "skip"),
            DetectorFailurePolicy::Halt => write!(f, "halt"),
        }
    }
}

impl std::str::FromStr for DetectorFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(DetectorFailurePolicy::Skip),
            "halt" => Ok(DetectorFailurePolicy::Halt),
            other => Err(format!("expected 'skip' or 'halt', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    pub refresh_hz: f64,
    pub on_detector_error: DetectorFailurePolicy,
    pub confidence: f64,
    pub summary_every: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            refresh_hz: DEFAULT_REFRESH_HZ,
            on_detector_error: DetectorFailurePolicy::Skip,
            confidence: 0.5,
            summary_every: DEFAULT_SUMMARY_EVERY,
        }
    }
}

impl LoopSettings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Loads from `path`. Unlike [`LoopSettings::load`], a missing or
    /// malformed file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads the per-user settings file, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path().filter(|p| p.exists()) else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring settings file: {e}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.refresh_hz.is_finite() && self.refresh_hz > 0.0) {
            return Err(SettingsError::RefreshRate(self.refresh_hz));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SettingsError::Confidence(self.confidence));
        }
        Ok(())
    }
}
