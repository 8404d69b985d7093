//! Configuration management for posecam
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`POSECAM__SECTION__KEY`). Saving always writes TOML.

use crate::errors::{CalibrationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "POSECAM";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PosecamConfig {
    pub capture: CaptureSettings,
    pub export: ExportSettings,
    pub recording: RecordingSettings,
}

/// Live capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Depth of each live subscriber queue; the oldest record is dropped when full
    pub live_queue_capacity: usize,
    /// Restart tracking from scratch after an interruption ends
    pub reset_tracking_on_resume: bool,
}

/// Sidecar export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Directory captures and sidecars are written to
    pub output_directory: String,
    /// Appended to the media stem to name the sidecar
    pub sidecar_suffix: String,
    /// Spaces per indentation level
    pub indent: usize,
}

/// Quality presets for the video sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingQuality {
    Low,
    Medium,
    High,
}

impl RecordingQuality {
    /// Recommended bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 2_500_000,
            RecordingQuality::Medium => 5_000_000,
            RecordingQuality::High => 10_000_000,
        }
    }
}

/// Video sink settings; frame dimensions always come from the first frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub fps: f64,
    pub quality: RecordingQuality,
    /// Overrides the preset bitrate when set
    pub bitrate: Option<u32>,
    pub fast_start: bool,
}

impl RecordingSettings {
    pub fn effective_bitrate(&self) -> u32 {
        self.bitrate.unwrap_or_else(|| self.quality.bitrate())
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            live_queue_capacity: 2,
            reset_tracking_on_resume: true,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_directory: "./captures".to_string(),
            sidecar_suffix: "_calibration".to_string(),
            indent: 2,
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            fps: 30.0,
            quality: RecordingQuality::Medium,
            bitrate: None,
            fast_start: true,
        }
    }
}

impl PosecamConfig {
    /// Load from `path` (optional) with `POSECAM__*` environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layered(path, ENV_PREFIX)
    }

    /// Load from `path` with environment overrides under `env_prefix`.
    pub fn load_layered<P: AsRef<Path>>(path: P, env_prefix: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PosecamConfig = settings.try_deserialize()?;
        config.validate()?;

        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CalibrationError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("posecam.toml")
    }

    /// Load from the default location, falling back to defaults on error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.export.output_directory)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.live_queue_capacity == 0 {
            return Err(CalibrationError::Config(
                "live_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.export.sidecar_suffix.is_empty() {
            return Err(CalibrationError::Config(
                "sidecar_suffix must not be empty".to_string(),
            ));
        }
        if self.export.indent > 8 {
            return Err(CalibrationError::Config(
                "indent must be between 0 and 8".to_string(),
            ));
        }
        if !(self.recording.fps > 0.0 && self.recording.fps <= 240.0) {
            return Err(CalibrationError::Config(
                "fps must be in (0, 240]".to_string(),
            ));
        }
        if self.recording.bitrate == Some(0) {
            return Err(CalibrationError::Config("bitrate must be non-zero".to_string()));
        }
        Ok(())
    }
}
